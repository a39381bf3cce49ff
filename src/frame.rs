// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoded-frame payload types crossing the decode engine boundary.
//!
//! The decode engine hands over ownership of one hardware frame per decoded picture. The pool
//! does not interpret the frame's export descriptor; it carries it unmodified from the moment
//! the frame is attached to a slot until the last holder releases the buffer, at which point
//! dropping the frame returns its storage to the engine's allocator.

use std::fmt;

/// A pixel format code in fourcc form, as DRM names plane formats.
///
/// The four characters occupy the u32 from the low byte up, so the numeric value matches the
/// `DRM_FORMAT_*` constants and the descriptor can cross the engine boundary as a plain
/// integer.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Fourcc(u32);

impl Fourcc {
    /// Builds the code from its four characters.
    #[inline(always)]
    pub fn new(a: u8, b: u8, c: u8, d: u8) -> Fourcc {
        Fourcc(u32::from_le_bytes([a, b, c, d]))
    }

    /// The four characters of the code, in order.
    #[inline(always)]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for Fourcc {
    fn from(u: u32) -> Fourcc {
        Fourcc(u)
    }
}

impl From<Fourcc> for u32 {
    fn from(f: Fourcc) -> u32 {
        f.0
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.to_bytes();
        if b.iter().all(u8::is_ascii_graphic) {
            let code: String = b.iter().map(|&c| c as char).collect();
            write!(f, "fourcc({})", code)
        } else {
            // Not a printable code; show the raw value instead.
            write!(f, "fourcc({:#010x})", self.0)
        }
    }
}

/// One exported memory object backing one or more planes of a frame.
#[derive(Clone, Debug)]
pub struct FrameObject {
    /// Prime file descriptor for the object, owned by the frame payload.
    pub fd: i32,
    /// Total size of the object in bytes.
    pub size: usize,
    /// Format modifier applied to the object's layout.
    pub modifier: u64,
}

/// Layout of one color plane within a frame's memory objects.
#[derive(Copy, Clone, Debug)]
pub struct FramePlane {
    /// Index into the descriptor's object table.
    pub object_index: usize,
    /// Byte offset of the plane within its object.
    pub offset: usize,
    /// Length in bytes of one row of the plane.
    pub stride: usize,
}

/// Export descriptor for a decoded hardware frame, in the shape the display layer needs to
/// import the buffer for zero-copy presentation.
///
/// The exact contents follow the engine's hardware-buffer-export convention; this crate only
/// preserves them.
#[derive(Clone, Debug)]
pub struct FrameDescriptor {
    pub fourcc: Fourcc,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<FrameObject>,
    pub planes: Vec<FramePlane>,
}

/// Per-picture metadata produced by the decode engine, carried through unmodified.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameMetadata {
    pub width: u32,
    pub height: u32,
    /// Sample aspect ratio as a rational, `(0, _)` when unknown.
    pub sample_aspect_ratio: (u32, u32),
    pub color_range: u32,
    pub color_primaries: u32,
    pub color_transfer: u32,
    pub color_space: u32,
    /// Presentation timestamp in the engine's time base, if the stream carried one.
    pub pts: Option<i64>,
    pub interlaced: bool,
    pub top_field_first: bool,
}

/// A decoded hardware frame owned by a pool slot.
///
/// Dropping the frame must release whatever storage the engine allocated for it; the pool
/// relies on plain ownership for that and never calls back into the engine.
pub trait DecodedFrame: Send + 'static {
    /// The frame's export descriptor, preserved unmodified from the decode engine.
    fn descriptor(&self) -> &FrameDescriptor;

    /// Picture metadata for this frame.
    fn metadata(&self) -> &FrameMetadata;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_debug_formats() {
        assert_eq!(
            format!("{:?}", Fourcc::new(b'P', b'0', b'1', b'0')),
            "fourcc(P010)"
        );
        assert_eq!(format!("{:?}", Fourcc::new(3, 0, 9, 255)), "fourcc(0xff090003)");
    }

    #[test]
    fn fourcc_matches_drm_byte_order() {
        let f = Fourcc::new(b'N', b'V', b'2', b'1');
        // DRM_FORMAT_NV21: first character in the low byte.
        assert_eq!(u32::from(f), 0x3132_564e);
        assert_eq!(Fourcc::from(0x3132_564e).to_bytes(), *b"NV21");
    }
}
