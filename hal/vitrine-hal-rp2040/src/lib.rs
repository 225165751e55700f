//! RP2040-specific HAL for the Vitrine engine
//!
//! Thin wrappers that implement the shared `vitrine-hal` traits on top of
//! `embassy-rp` peripherals:
//!
//! - Blocking SPI master for the coprocessor link
//! - Output pins for chip select and power-down
//! - Input pin for the interrupt line

#![no_std]

pub mod gpio;
pub mod spi;

pub use gpio::{RpInput, RpOutput};
pub use spi::RpSpi;
