// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! One reusable decoded-frame slot and the kernel handles attached to it.
//!
//! A slot is either idle (no frame, no kernel handles) or live (owning exactly one decoded
//! frame, plus whatever scanout handles the render path has imported for it so far). The two
//! states are one `Option`: kernel handles only exist inside an [`Attachment`], and an
//! `Attachment` only exists while a frame is owned, so a slot can never hold handles that
//! describe an older frame than the one attached.

use log::warn;

use crate::drm::DrmDevice;

/// Kernel objects created when the render path imports a frame for presentation.
///
/// The frame buffer registration references the GEM handles, so teardown removes the
/// registration first and closes the handles after it.
#[derive(Debug, Default)]
pub struct ScanoutHandles {
    /// Frame buffer registration id, if the frame was registered for scanout.
    pub fb_id: Option<u32>,
    /// GEM handles for the frame's memory objects, one per imported object.
    pub buffer_handles: Vec<u32>,
}

impl ScanoutHandles {
    pub fn new(fb_id: Option<u32>, buffer_handles: Vec<u32>) -> ScanoutHandles {
        ScanoutHandles {
            fb_id,
            buffer_handles,
        }
    }

    /// True if no kernel object is held.
    pub fn is_empty(&self) -> bool {
        self.fb_id.is_none() && self.buffer_handles.is_empty()
    }

    /// Releases every held kernel object, registration first, then each memory handle in
    /// ascending order.
    ///
    /// A failed release is logged and the remaining objects are still released; wedging the
    /// slot on a kernel error would turn one leaked handle into a permanently lost slot.
    /// Releasing an empty set is a no-op, so calling this twice is safe.
    pub fn release(&mut self, device: &dyn DrmDevice) {
        if let Some(fb_id) = self.fb_id.take() {
            if let Err(e) = device.remove_framebuffer(fb_id) {
                warn!("failed to remove framebuffer {}: {}", fb_id, e);
            }
        }

        for handle in self.buffer_handles.drain(..) {
            if let Err(e) = device.close_buffer(handle) {
                warn!("failed to close buffer handle {}: {}", handle, e);
            }
        }
    }
}

/// A live slot's contents: the owned frame and its imported kernel objects.
#[derive(Debug)]
pub(crate) struct Attachment<F> {
    pub frame: F,
    pub scanout: ScanoutHandles,
}

/// One decoded-frame slot of a buffer pool.
///
/// The id indexes the pool's slot table; it is assigned once when the pool grows and never
/// changes or gets reused for a different slot.
#[derive(Debug)]
pub(crate) struct Slot<F> {
    id: usize,
    attachment: Option<Attachment<F>>,
}

impl<F> Slot<F> {
    pub fn new(id: usize) -> Slot<F> {
        Slot {
            id,
            attachment: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.attachment.is_none()
    }

    /// Releases whatever the slot currently holds, then takes ownership of `frame`.
    ///
    /// Safe on an idle slot; the release is then a no-op. The new frame starts with no
    /// scanout handles, which the render path attaches lazily on first import.
    pub fn reset(&mut self, device: &dyn DrmDevice, frame: F) {
        self.release_resources(device);
        self.attachment = Some(Attachment {
            frame,
            scanout: ScanoutHandles::default(),
        });
    }

    /// Idles the slot: releases its kernel objects and drops the owned frame.
    ///
    /// Idempotent; releasing an idle slot does nothing.
    pub fn release_resources(&mut self, device: &dyn DrmDevice) {
        if let Some(mut attachment) = self.attachment.take() {
            attachment.scanout.release(device);
            // Dropping the attachment releases the frame's storage back to the engine.
        }
    }

    /// Stores the kernel objects the render path imported for the attached frame.
    ///
    /// Panics if the slot is idle or already holds scanout handles; either means the caller
    /// is importing against a frame that is not the one it thinks it is.
    pub fn attach_scanout(&mut self, handles: ScanoutHandles) {
        let attachment = self
            .attachment
            .as_mut()
            .unwrap_or_else(|| panic!("attach_scanout on idle slot {}", self.id));
        assert!(
            attachment.scanout.is_empty(),
            "slot {} already has scanout handles attached",
            self.id
        );
        attachment.scanout = handles;
    }

    pub fn frame(&self) -> Option<&F> {
        self.attachment.as_ref().map(|a| &a.frame)
    }
}
