//! Command encoder
//!
//! Pure functions from typed requests to 32-bit words. Nothing in here
//! touches the bus; the [`CommandBuffer`](crate::buffer::CommandBuffer)
//! decides when words go out.
//!
//! - [`dl`] - display list primitives, executed by the graphics engine
//! - [`cmd`] - coprocessor commands (`0xFFFFFFxx` opcode plus operands)
//! - [`format`] - pixel formats and their memory footprint

pub mod cmd;
pub mod dl;
pub mod format;

pub use format::{BitmapFormat, SketchFormat, SnapshotFormat};
