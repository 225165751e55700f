//! Stored object records

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::encode::{BitmapFormat, SketchFormat, SnapshotFormat};

/// Longest object name
pub const MAX_NAME_LEN: usize = 16;

/// Stable handle to a stored object
///
/// Survives compaction; goes stale once the object is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectId {
    pub(crate) index: u8,
    pub(crate) generation: u16,
}

/// What a stored object holds and how to draw it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ObjectKind {
    /// Copy of display list RAM, replayed with `CMD_APPEND`
    DisplayList,
    /// Screen region captured by `CMD_SNAPSHOT2`
    Snapshot {
        format: SnapshotFormat,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    },
    /// Freehand drawing target for `CMD_SKETCH`
    Sketch {
        format: SketchFormat,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    },
    /// Decoded with `CMD_LOADIMAGE`
    Jpeg {
        format: BitmapFormat,
        width: u16,
        height: u16,
    },
    /// Decoded with `CMD_LOADIMAGE`
    Png {
        format: BitmapFormat,
        width: u16,
        height: u16,
    },
    /// Deflate stream expanded with `CMD_INFLATE`
    Compressed {
        format: BitmapFormat,
        width: u16,
        height: u16,
    },
}

impl ObjectKind {
    /// Bitmap layout to draw with, `None` for display lists and formats
    /// the plain layout cannot express
    pub fn bitmap(&self) -> Option<(BitmapFormat, u16, u16)> {
        match *self {
            ObjectKind::DisplayList => None,
            ObjectKind::Snapshot {
                format,
                width,
                height,
                ..
            } => format.bitmap().map(|f| (f, width, height)),
            ObjectKind::Sketch {
                format,
                width,
                height,
                ..
            } => Some((format.bitmap(), width, height)),
            ObjectKind::Jpeg {
                format,
                width,
                height,
            }
            | ObjectKind::Png {
                format,
                width,
                height,
            }
            | ObjectKind::Compressed {
                format,
                width,
                height,
            } => Some((format, width, height)),
        }
    }
}

/// A named block of RAM_G
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String<MAX_NAME_LEN>,
    /// Byte offset in RAM_G; changed only by compaction
    pub address: u32,
    pub size: u32,
    pub kind: ObjectKind,
}

impl StoredObject {
    /// One past the last byte
    pub fn end(&self) -> u32 {
        self.address + self.size
    }
}
