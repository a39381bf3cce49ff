// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The kernel seam for releasing imported frame resources.
//!
//! The render path imports a decoded frame by turning its prime file descriptors into GEM
//! handles and registering a frame buffer for scanout. Both are kernel objects that must be
//! explicitly released when the buffer is recycled. `DrmDevice` is the narrow interface the
//! pool needs for that teardown; `Card` implements it against a real DRM device node, and
//! tests substitute a recording implementation.

use std::io;

/// A device that can release the kernel objects attached to a recycled buffer.
pub trait DrmDevice: Send + Sync {
    /// Removes a frame buffer registration previously created for scanout.
    fn remove_framebuffer(&self, fb_id: u32) -> io::Result<()>;

    /// Closes a GEM memory-object handle.
    fn close_buffer(&self, handle: u32) -> io::Result<()>;
}

#[cfg(any(target_os = "android", target_os = "linux"))]
pub use self::card::Card;

#[cfg(any(target_os = "android", target_os = "linux"))]
mod card {
    use std::fs::File;
    use std::fs::OpenOptions;
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use drm_sys::drm_gem_close;
    use drm_sys::DRM_IOCTL_GEM_CLOSE;
    use drm_sys::DRM_IOCTL_MODE_RMFB;

    use super::DrmDevice;

    /// A DRM device node, typically opened from `/dev/dri/`.
    #[derive(Debug)]
    pub struct Card {
        fd: File,
    }

    impl Card {
        /// Opens the device node at `path` for resource management.
        pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Card> {
            let fd = OpenOptions::new().read(true).write(true).open(path)?;
            Ok(Card { fd })
        }

        /// Wraps an already opened DRM device file.
        pub fn new(fd: File) -> Card {
            Card { fd }
        }
    }

    impl DrmDevice for Card {
        fn remove_framebuffer(&self, fb_id: u32) -> io::Result<()> {
            let mut id = fb_id as libc::c_uint;
            // Safe because the fd is a valid DRM device owned by self and the ioctl only reads
            // and writes the id for the duration of the call.
            let ret = unsafe {
                libc::ioctl(self.fd.as_raw_fd(), DRM_IOCTL_MODE_RMFB, &mut id)
            };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn close_buffer(&self, handle: u32) -> io::Result<()> {
            let gem_close = drm_gem_close { handle, pad: 0 };
            // Safe because the fd is a valid DRM device owned by self and the argument struct
            // outlives the call.
            let ret = unsafe {
                libc::ioctl(self.fd.as_raw_fd(), DRM_IOCTL_GEM_CLOSE, &gem_close)
            };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }
}
