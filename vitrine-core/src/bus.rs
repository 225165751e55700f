//! Register access to the EVE chip
//!
//! [`Bus`] is the engine's view of the chip: addressed reads and writes
//! plus a short blocking delay for the polling loops. [`SpiTransport`]
//! implements it over the HAL traits with the chip-select framed wire
//! format:
//!
//! ```text
//! write: CS↓ │ 0b10AAAAAA │ AAAAAAAA │ AAAAAAAA │ data... │ CS↑
//! read:  CS↓ │ 0b00AAAAAA │ AAAAAAAA │ AAAAAAAA │ dummy │ data... │ CS↑
//! ```
//!
//! Multi-byte register values are little-endian.

use embedded_hal::delay::DelayNs;
use vitrine_hal::{OutputPin, SpiBus};

use crate::regs::{CHIP_ID, REG_CPURESET, REG_ID};

/// Bus-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The SPI peripheral reported an error
    Spi,
    /// Chip never answered with the expected ID
    NotResponding,
}

/// Addressed access to the chip's memory space
pub trait Bus {
    /// Read `buf.len()` bytes starting at `address`
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError>;

    /// Block for roughly `us` microseconds
    fn delay_us(&mut self, us: u32);

    fn rd8(&mut self, address: u32) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    fn rd16(&mut self, address: u32) -> Result<u16, BusError> {
        let mut buf = [0u8; 2];
        self.read(address, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn rd32(&mut self, address: u32) -> Result<u32, BusError> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn wr8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        self.write(address, &[value])
    }

    fn wr16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        self.write(address, &value.to_le_bytes())
    }

    fn wr32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        self.write(address, &value.to_le_bytes())
    }
}

/// Build the 3-byte address header for a write transaction
pub const fn write_header(address: u32) -> [u8; 3] {
    [
        0x80 | ((address >> 16) as u8 & 0x3F),
        (address >> 8) as u8,
        address as u8,
    ]
}

/// Build the address header plus dummy byte for a read transaction
pub const fn read_header(address: u32) -> [u8; 4] {
    [
        (address >> 16) as u8 & 0x3F,
        (address >> 8) as u8,
        address as u8,
        0,
    ]
}

/// [`Bus`] over an SPI master, a chip-select line and a delay source
pub struct SpiTransport<S, P, D> {
    spi: S,
    cs: P,
    delay: D,
}

impl<S, P, D> SpiTransport<S, P, D>
where
    S: SpiBus,
    P: OutputPin,
    D: DelayNs,
{
    /// Take ownership of the link. Chip select is released immediately.
    pub fn new(spi: S, mut cs: P, delay: D) -> Self {
        cs.set_high();
        Self { spi, cs, delay }
    }

    /// Give the peripherals back
    pub fn release(self) -> (S, P, D) {
        (self.spi, self.cs, self.delay)
    }

    fn framed<F>(&mut self, f: F) -> Result<(), BusError>
    where
        F: FnOnce(&mut S) -> Result<(), S::Error>,
    {
        self.cs.set_low();
        let result = f(&mut self.spi);
        self.cs.set_high();
        result.map_err(|_| BusError::Spi)
    }
}

impl<S, P, D> Bus for SpiTransport<S, P, D>
where
    S: SpiBus,
    P: OutputPin,
    D: DelayNs,
{
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError> {
        let header = read_header(address);
        self.framed(|spi| {
            spi.write(&header)?;
            spi.read(buf)
        })
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
        let header = write_header(address);
        self.framed(|spi| {
            spi.write(&header)?;
            spi.write(data)
        })
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

/// Poll until the chip reports its ID and the coprocessor is out of reset
///
/// Each poll waits `poll_us` first; the chip needs a few hundred
/// milliseconds after the clock is enabled.
pub fn wait_ready<B: Bus>(bus: &mut B, retries: u16, poll_us: u32) -> Result<(), BusError> {
    for _ in 0..retries {
        bus.delay_us(poll_us);
        if bus.rd8(REG_ID)? == CHIP_ID && bus.rd8(REG_CPURESET)? & 0x07 == 0 {
            return Ok(());
        }
    }
    Err(BusError::NotResponding)
}
