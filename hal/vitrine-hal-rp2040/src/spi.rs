//! Blocking SPI master
//!
//! The engine frames every register access with chip select itself, so
//! the wrapper only moves bytes. Clock changes go through
//! [`RpSpi::set_config`]: the chip starts on its internal oscillator and
//! can only take the full SPI rate once its PLL is up.

use embassy_rp::spi::{self, Blocking, Instance, Spi};
use vitrine_hal::spi::{Phase, Polarity, SpiConfig};
use vitrine_hal::SpiBus;

/// SPI error reported by the RP2040 peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiError;

/// `embassy-rp` SPI in blocking mode
pub struct RpSpi<'d, T: Instance> {
    spi: Spi<'d, T, Blocking>,
}

impl<'d, T: Instance> RpSpi<'d, T> {
    pub fn new(spi: Spi<'d, T, Blocking>) -> Self {
        Self { spi }
    }

    /// Reprogram clock rate and mode
    pub fn set_config(&mut self, config: &SpiConfig) {
        self.spi.set_config(&to_embassy(config));
    }

    pub fn release(self) -> Spi<'d, T, Blocking> {
        self.spi
    }
}

/// Translate the shared config into the peripheral's
pub fn to_embassy(config: &SpiConfig) -> spi::Config {
    let mut out = spi::Config::default();
    out.frequency = config.frequency;
    out.polarity = match config.polarity {
        Polarity::IdleLow => spi::Polarity::IdleLow,
        Polarity::IdleHigh => spi::Polarity::IdleHigh,
    };
    out.phase = match config.phase {
        Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
        Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
    };
    out
}

impl<'d, T: Instance> SpiBus for RpSpi<'d, T> {
    type Error = SpiError;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiError> {
        self.spi.blocking_transfer(read, write).map_err(|_| SpiError)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SpiError> {
        self.spi.blocking_write(data).map_err(|_| SpiError)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), SpiError> {
        self.spi.blocking_read(buf).map_err(|_| SpiError)
    }
}
