//! Engine configuration
//!
//! Tunables for the polling loops, fault handling and RAM_G layout. The
//! struct is stored as postcard binary data alongside the board's touch
//! calibration.

use serde::{Deserialize, Serialize};

use crate::regs::{RAM_G, RAM_G_SCRATCH};

/// Serialized size upper bound for [`EngineConfig`]
pub const MAX_CONFIG_BYTES: usize = 64;

/// Errors from config (de)serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small
    BufferTooSmall,
    /// Stored bytes did not decode
    Deserialize,
}

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// First RAM_G byte handed to the allocator
    pub ramg_start: u32,
    /// One past the last RAM_G byte handed to the allocator
    ///
    /// Kept below [`RAM_G_SCRATCH`] so image decoding never clobbers
    /// stored objects.
    pub ramg_end: u32,
    /// Polls of `REG_CMDB_SPACE` before a stalled FIFO counts as a fault
    pub drain_retries: u16,
    /// Delay between FIFO drain polls (µs)
    pub drain_poll_us: u32,
    /// Polls of `REG_FLASH_STATUS` before flash init gives up
    pub flash_retries: u16,
    /// Delay between flash status polls (µs)
    pub flash_poll_us: u32,
    /// Polls of `REG_ID` while waiting for the chip to boot
    pub ready_retries: u16,
    /// Consecutive faults tolerated before the buffer halts for good
    pub max_consecutive_faults: u8,
    /// Pixel clock divisor restored if a fault zeroes `REG_PCLK` (0 = leave)
    pub pclk: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ramg_start: RAM_G,
            ramg_end: RAM_G_SCRATCH,
            drain_retries: 1000,
            drain_poll_us: 100,
            flash_retries: 100,
            flash_poll_us: 1000,
            ready_retries: 300,
            max_consecutive_faults: 8,
            pclk: 0,
        }
    }
}

impl EngineConfig {
    /// Bytes available to the allocator
    pub fn ramg_capacity(&self) -> u32 {
        self.ramg_end.saturating_sub(self.ramg_start)
    }

    /// Serialize into `buf`, returning the used prefix length
    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        postcard::to_slice(self, buf)
            .map(|used| used.len())
            .map_err(|_| ConfigError::BufferTooSmall)
    }

    /// Deserialize from postcard bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reserves_scratch() {
        let config = EngineConfig::default();
        assert_eq!(config.ramg_start, 0);
        assert!(config.ramg_end <= RAM_G_SCRATCH);
        assert_eq!(config.ramg_capacity(), RAM_G_SCRATCH);
    }

    #[test]
    fn test_postcard_persistence() {
        let config = EngineConfig {
            ramg_start: 0x1000,
            pclk: 2,
            max_consecutive_faults: 3,
            ..Default::default()
        };

        let mut buf = [0u8; MAX_CONFIG_BYTES];
        let len = config.to_bytes(&mut buf).unwrap();
        assert!(len > 0);

        let restored = EngineConfig::from_bytes(&buf[..len]).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let config = EngineConfig::default();
        let mut buf = [0u8; 2];
        assert_eq!(config.to_bytes(&mut buf), Err(ConfigError::BufferTooSmall));
        assert_eq!(EngineConfig::from_bytes(&[]), Err(ConfigError::Deserialize));
    }
}
