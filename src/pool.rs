// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The buffer pool and the reference-counted handle it serves.
//!
//! The pool tracks which slots are in flight and which are free for reuse; the slots
//! themselves each sit behind their own lock so that kernel teardown for one slot never
//! serializes against another slot's handling or against pool bookkeeping. Handles share
//! ownership of the pool, so the pool outlives every buffer it has handed out even if the
//! decoder that created it is long gone.

use std::sync::Arc;

use sync::Mutex;

use crate::buffer::ScanoutHandles;
use crate::buffer::Slot;
use crate::drm::DrmDevice;
use crate::frame::DecodedFrame;
use crate::frame::FrameDescriptor;
use crate::frame::FrameMetadata;

type SharedSlot<F> = Arc<Mutex<Slot<F>>>;

struct PoolInner<F> {
    /// Every slot ever created, indexed by slot id. Grows on exhaustion, never shrinks.
    all: Vec<SharedSlot<F>>,
    /// Ids currently handed out to a consumer.
    used: Vec<usize>,
    /// Ids available for reuse, most recently freed last.
    free: Vec<usize>,
}

/// A growable pool of decoded-frame slots.
///
/// `get()` serves the most recently freed slot when one is available and grows the slot table
/// by one otherwise, so steady-state decoding settles on as many slots as the pipeline holds
/// in flight and stops allocating.
pub struct PrimeBufferPool<F> {
    device: Arc<dyn DrmDevice>,
    inner: Mutex<PoolInner<F>>,
}

impl<F> PrimeBufferPool<F> {
    /// Creates an empty pool whose slots release their kernel objects through `device`.
    pub fn new(device: Arc<dyn DrmDevice>) -> Arc<PrimeBufferPool<F>> {
        Arc::new(PrimeBufferPool {
            device,
            inner: Mutex::new(PoolInner {
                all: Vec::new(),
                used: Vec::new(),
                free: Vec::new(),
            }),
        })
    }

    /// Takes a free slot out of the pool, growing the slot table if none is free, and returns
    /// it as a buffer handle with an initial reference grant of one.
    ///
    /// The returned slot is idle; the caller attaches a frame with
    /// [`PrimeVideoBuffer::reset`] before publishing the handle.
    pub fn get(self: &Arc<Self>) -> PrimeVideoBuffer<F> {
        let (id, slot) = {
            let mut inner = self.inner.lock();
            let id = match inner.free.pop() {
                Some(id) => id,
                None => {
                    let id = inner.all.len();
                    inner.all.push(Arc::new(Mutex::new(Slot::new(id))));
                    id
                }
            };
            inner.used.push(id);
            debug_assert_consistent(&inner);
            (id, Arc::clone(&inner.all[id]))
        };

        // Only slots that finished teardown are reachable through the free list.
        debug_assert!(slot.lock().is_idle());

        PrimeVideoBuffer {
            inner: Arc::new(BufferInner {
                pool: Arc::clone(self),
                slot,
                id,
            }),
        }
    }

    /// Total number of slots ever created.
    pub fn num_slots(&self) -> usize {
        self.inner.lock().all.len()
    }

    /// Number of slots currently handed out.
    pub fn num_in_flight(&self) -> usize {
        self.inner.lock().used.len()
    }

    /// Number of idle slots available for reuse.
    pub fn num_free(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// The device slots release their kernel objects through.
    pub fn device(&self) -> &Arc<dyn DrmDevice> {
        &self.device
    }

    /// Idles the slot and moves its id back to the free list.
    ///
    /// Called exactly once per handout, by the last dropped handle clone. The kernel calls
    /// run under the slot's own lock; only the membership update holds the pool lock, so a
    /// concurrent `get()` can never observe a slot mid-teardown.
    fn return_buffer(&self, id: usize, slot: &Mutex<Slot<F>>) {
        slot.lock().release_resources(self.device.as_ref());

        let mut inner = self.inner.lock();
        let pos = inner
            .used
            .iter()
            .position(|&used_id| used_id == id)
            .unwrap_or_else(|| panic!("buffer {} returned but not in flight", id));
        inner.used.swap_remove(pos);
        inner.free.push(id);
        debug_assert_consistent(&inner);
    }
}

impl<F> Drop for PrimeBufferPool<F> {
    fn drop(&mut self) {
        // No handle is outstanding here since each one shares ownership of the pool, so every
        // slot is reachable and gets its resources released exactly once.
        let inner = self.inner.get_mut();
        for slot in &inner.all {
            slot.lock().release_resources(self.device.as_ref());
        }
    }
}

/// `used` and `free` must stay disjoint and together cover the slot table.
fn debug_assert_consistent<F>(inner: &PoolInner<F>) {
    if cfg!(debug_assertions) {
        let mut ids: Vec<usize> = inner.used.iter().chain(inner.free.iter()).copied().collect();
        ids.sort_unstable();
        let expected: Vec<usize> = (0..inner.all.len()).collect();
        assert_eq!(ids, expected, "pool membership out of sync");
    }
}

struct BufferInner<F> {
    pool: Arc<PrimeBufferPool<F>>,
    slot: SharedSlot<F>,
    id: usize,
}

impl<F> Drop for BufferInner<F> {
    fn drop(&mut self) {
        self.pool.return_buffer(self.id, &self.slot);
    }
}

/// A reference-counted handle to one live decoded-frame buffer.
///
/// Cloning the handle grants another consumer a reference; dropping the last clone releases
/// the slot's kernel objects and frame storage and returns the slot to the pool. The
/// clone/drop pair is the acquire/release protocol, so an unbalanced release cannot be
/// expressed.
pub struct PrimeVideoBuffer<F> {
    inner: Arc<BufferInner<F>>,
}

impl<F> Clone for PrimeVideoBuffer<F> {
    fn clone(&self) -> PrimeVideoBuffer<F> {
        PrimeVideoBuffer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> PrimeVideoBuffer<F> {
    /// The stable id of the slot backing this buffer.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Releases whatever the slot currently holds and transfers `frame` into it.
    ///
    /// This is the publish step of the decode path; it runs before the handle is shared with
    /// any other consumer.
    pub fn reset(&self, frame: F) {
        self.inner
            .slot
            .lock()
            .reset(self.inner.pool.device.as_ref(), frame);
    }

    /// Stores the kernel objects the render path imported for this buffer's frame. They are
    /// released when the buffer is recycled.
    pub fn attach_scanout(&self, handles: ScanoutHandles) {
        self.inner.slot.lock().attach_scanout(handles);
    }

    /// Runs `f` with a reference to the attached frame.
    ///
    /// The slot lock is held while `f` runs, so `f` must not call this buffer's other
    /// accessors (or `with_frame` again); copy what it needs out of the frame instead.
    ///
    /// Panics if no frame is attached; a published buffer always carries one.
    pub fn with_frame<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        let slot = self.inner.slot.lock();
        let frame = slot
            .frame()
            .unwrap_or_else(|| panic!("buffer {} has no frame attached", self.inner.id));
        f(frame)
    }
}

impl<F: DecodedFrame> PrimeVideoBuffer<F> {
    /// Picture metadata of the attached frame.
    pub fn metadata(&self) -> FrameMetadata {
        self.with_frame(|frame| *frame.metadata())
    }

    /// The frame's export descriptor, e.g. for importing the buffer for presentation.
    ///
    /// Returned by value so the caller holds no lock while working with it.
    pub fn descriptor(&self) -> FrameDescriptor {
        self.with_frame(|frame| frame.descriptor().clone())
    }
}
