//! Pixel formats
//!
//! Sizes here decide how many RAM_G bytes a stored object claims, so they
//! follow the datasheet's stride rules exactly (L1 rows round up to whole
//! bytes, L4 rows to whole nibbles).

use serde::{Deserialize, Serialize};

/// Bitmap formats understood by `BITMAP_LAYOUT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BitmapFormat {
    Argb1555 = 0,
    L1 = 1,
    L4 = 2,
    L8 = 3,
    Rgb332 = 4,
    Argb2 = 5,
    Argb4 = 6,
    Rgb565 = 7,
    L2 = 17,
}

impl BitmapFormat {
    /// Raw value for `BITMAP_LAYOUT`
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Bytes per row for a bitmap `width` pixels wide
    pub const fn stride(self, width: u16) -> u32 {
        let w = width as u32;
        match self {
            BitmapFormat::L1 => (w + 7) / 8,
            BitmapFormat::L2 => (w + 3) / 4,
            BitmapFormat::L4 => (w + 1) / 2,
            BitmapFormat::L8 | BitmapFormat::Rgb332 | BitmapFormat::Argb2 => w,
            BitmapFormat::Argb1555 | BitmapFormat::Argb4 | BitmapFormat::Rgb565 => w * 2,
        }
    }

    /// Bytes occupied by a `width` x `height` bitmap
    pub const fn size(self, width: u16, height: u16) -> u32 {
        self.stride(width) * height as u32
    }
}

/// Formats `CMD_SNAPSHOT2` can capture into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SnapshotFormat {
    Rgb565,
    Argb4,
    /// 32-bit ARGB, drawable only via `BITMAP_EXT_FORMAT`
    Argb8,
}

impl SnapshotFormat {
    /// Raw format operand for `CMD_SNAPSHOT2`
    pub const fn raw(self) -> u32 {
        match self {
            SnapshotFormat::Rgb565 => BitmapFormat::Rgb565 as u32,
            SnapshotFormat::Argb4 => BitmapFormat::Argb4 as u32,
            SnapshotFormat::Argb8 => 0x20,
        }
    }

    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            SnapshotFormat::Rgb565 | SnapshotFormat::Argb4 => 2,
            SnapshotFormat::Argb8 => 4,
        }
    }

    pub const fn size(self, width: u16, height: u16) -> u32 {
        width as u32 * height as u32 * self.bytes_per_pixel()
    }

    /// Format to draw the snapshot with, if the plain layout can express it
    pub const fn bitmap(self) -> Option<BitmapFormat> {
        match self {
            SnapshotFormat::Rgb565 => Some(BitmapFormat::Rgb565),
            SnapshotFormat::Argb4 => Some(BitmapFormat::Argb4),
            SnapshotFormat::Argb8 => None,
        }
    }
}

/// Formats `CMD_SKETCH` can draw into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SketchFormat {
    L1,
    L8,
}

impl SketchFormat {
    pub const fn bitmap(self) -> BitmapFormat {
        match self {
            SketchFormat::L1 => BitmapFormat::L1,
            SketchFormat::L8 => BitmapFormat::L8,
        }
    }

    pub const fn size(self, width: u16, height: u16) -> u32 {
        self.bitmap().size(width, height)
    }
}
