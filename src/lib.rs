// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A pooled, reference-counted buffer layer for hardware video decoding with
//! [DRM PRIME](https://docs.kernel.org/gpu/drm-mm.html) zero-copy frame export.
//!
//! A decode thread publishes each decoded hardware frame through a [`PrimeBufferPool`]; the
//! render and display threads hold clones of the resulting [`PrimeVideoBuffer`] and the last
//! release returns the slot, after its kernel objects (frame buffer registration, GEM
//! handles) are torn down exactly once. Slots are recycled most-recently-freed first and the
//! pool only grows on exhaustion, so steady-state decoding does not pay a kernel round trip
//! per frame.
//!
//! # Examples
//!
//! ```rust
//! # use std::io;
//! # use std::sync::Arc;
//! use prime_video::DrmDevice;
//! use prime_video::PrimeBufferPool;
//!
//! struct NullDevice;
//!
//! impl DrmDevice for NullDevice {
//!     fn remove_framebuffer(&self, _fb_id: u32) -> io::Result<()> {
//!         Ok(())
//!     }
//!     fn close_buffer(&self, _handle: u32) -> io::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let pool = PrimeBufferPool::new(Arc::new(NullDevice));
//! let buffer = pool.get();
//! buffer.reset("a decoded frame");
//!
//! let shared = buffer.clone();
//! drop(buffer);
//! assert_eq!(pool.num_in_flight(), 1);
//!
//! drop(shared);
//! assert_eq!(pool.num_free(), 1);
//! assert_eq!(pool.num_slots(), 1);
//! ```

mod buffer;
pub mod drm;
pub mod frame;
pub mod pool;
pub mod session;

pub use crate::buffer::ScanoutHandles;
#[cfg(any(target_os = "android", target_os = "linux"))]
pub use crate::drm::Card;
pub use crate::drm::DrmDevice;
pub use crate::frame::DecodedFrame;
pub use crate::frame::Fourcc;
pub use crate::frame::FrameDescriptor;
pub use crate::frame::FrameMetadata;
pub use crate::frame::FrameObject;
pub use crate::frame::FramePlane;
pub use crate::pool::PrimeBufferPool;
pub use crate::pool::PrimeVideoBuffer;
pub use crate::session::DecodeEngine;
pub use crate::session::DecodeError;
pub use crate::session::DecodeSession;
pub use crate::session::EngineError;
pub use crate::session::EngineEvent;
pub use crate::session::Packet;
pub use crate::session::PictureEvent;
pub use crate::session::SendStatus;
