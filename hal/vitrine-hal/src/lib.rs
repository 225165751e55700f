//! Vitrine Hardware Abstraction Layer
//!
//! This crate defines the traits the EVE engine needs from the host MCU.
//! Chip-specific HALs (RP2040, ...) implement them so the same engine
//! code can drive a display from different boards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  vitrine-core (command engine, RAM_G)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  vitrine-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ vitrine-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`spi::SpiBus`] - byte-serial link to the coprocessor
//! - [`gpio::OutputPin`] - chip select and power-down lines
//! - [`gpio::InputPin`] - the coprocessor's interrupt line

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use gpio::{InputPin, OutputPin};
pub use spi::{SpiBus, SpiConfig};
