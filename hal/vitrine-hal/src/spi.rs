//! SPI bus abstractions
//!
//! The EVE chips are SPI slaves in mode 0. Chip select is driven
//! separately through an [`OutputPin`](crate::gpio::OutputPin) so that a
//! whole register transaction (address header plus payload) can be framed
//! by the caller.

/// SPI bus master
///
/// Blocking transfers only: the coprocessor protocol is a sequence of short
/// framed transactions and the engine polls between them.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Transfer data (simultaneous read/write)
    ///
    /// Both buffers must be the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Write data, discarding whatever is clocked in
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data (clocks out zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy)]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity
    pub polarity: Polarity,
    /// Clock phase
    pub phase: Phase,
}

impl SpiConfig {
    /// Clock used until the chip's PLL is running.
    ///
    /// The datasheets cap SPI at 11 MHz while the system clock is still
    /// on the internal oscillator.
    pub const fn boot() -> Self {
        Self {
            frequency: 8_000_000,
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
        }
    }

    /// Clock used once the chip reports ready
    pub const fn running() -> Self {
        Self {
            frequency: 24_000_000,
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
        }
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::boot()
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}
