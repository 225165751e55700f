//! Board-agnostic engine for EVE display coprocessors
//!
//! This crate contains everything that talks to the chip without depending
//! on a specific MCU:
//!
//! - Register transport over the HAL SPI traits
//! - Display-list and coprocessor command encoding
//! - Command buffer with FIFO flow control and fault recovery
//! - Compacting RAM_G object allocator
//! - External flash bring-up and transfers
//! - Interrupt router for tags, touch, swap and tracking
//! - Timers and eased animations (backlight fades)
//! - Touch calibration and engine configuration

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod animation;
pub mod buffer;
pub mod bus;
pub mod canvas;
pub mod config;
pub mod encode;
pub mod engine;
pub mod flash;
pub mod ramg;
pub mod regs;
pub mod router;
pub mod timer;
pub mod touch;

#[cfg(test)]
mod mock;

pub use buffer::{BufferError, CommandBuffer, Flush};
pub use bus::{Bus, BusError, SpiTransport};
pub use canvas::{Canvas, CanvasExt};
pub use config::EngineConfig;
pub use engine::{Engine, EngineError, Event};
pub use flash::{FlashError, FlashManager};
pub use ramg::{AllocError, ObjectId, RamG};
pub use router::{Router, RouterError};
