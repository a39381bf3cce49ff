// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DRM bindings for the ioctls used to tear down imported frame resources.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use std::mem::size_of;

use libc::c_uint;
use libc::c_ulong;

const _IOC_WRITE: c_ulong = 1;
const _IOC_READ: c_ulong = 2;

const _IOC_NRSHIFT: c_ulong = 0;
const _IOC_TYPESHIFT: c_ulong = 8;
const _IOC_SIZESHIFT: c_ulong = 16;
const _IOC_DIRSHIFT: c_ulong = 30;

const DRM_IOCTL_BASE: c_ulong = 'd' as c_ulong;

const fn ioc(dir: c_ulong, nr: c_ulong, size: usize) -> c_ulong {
    (dir << _IOC_DIRSHIFT)
        | (DRM_IOCTL_BASE << _IOC_TYPESHIFT)
        | (nr << _IOC_NRSHIFT)
        | ((size as c_ulong) << _IOC_SIZESHIFT)
}

const fn drm_iow(nr: c_ulong, size: usize) -> c_ulong {
    ioc(_IOC_WRITE, nr, size)
}

const fn drm_iowr(nr: c_ulong, size: usize) -> c_ulong {
    ioc(_IOC_READ | _IOC_WRITE, nr, size)
}

/// Argument to `DRM_IOCTL_GEM_CLOSE`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_gem_close {
    pub handle: u32,
    pub pad: u32,
}

pub const DRM_IOCTL_GEM_CLOSE: c_ulong = drm_iow(0x09, size_of::<drm_gem_close>());
pub const DRM_IOCTL_MODE_RMFB: c_ulong = drm_iowr(0xAF, size_of::<c_uint>());
