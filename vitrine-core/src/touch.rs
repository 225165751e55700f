//! Touch calibration
//!
//! `CMD_CALIBRATE` asks the user to tap three dots and leaves a 3×2 fixed
//! point matrix in `REG_TOUCH_TRANSFORM_A..F`. The matrix is board specific,
//! so it is read back and stored next to the engine config; on later boots
//! it is written straight to the registers instead of calibrating again.

use serde::{Deserialize, Serialize};

use crate::buffer::{BufferError, CommandBuffer, Flush};
use crate::bus::Bus;
use crate::canvas::CanvasExt;
use crate::config::ConfigError;
use crate::encode::cmd::{self, opt};
use crate::regs::REG_TOUCH_TRANSFORM;

/// Serialized size upper bound for [`TouchTransform`]
pub const MAX_TRANSFORM_BYTES: usize = 32;

/// Time the user gets to finish calibrating
const CALIBRATE_TIMEOUT_US: u32 = 30_000_000;

/// Errors from calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchError {
    Buffer(BufferError),
    /// Coprocessor reported a failed calibration
    Failed,
    /// Coprocessor was reset before calibration finished
    Faulted,
}

impl From<BufferError> for TouchError {
    fn from(e: BufferError) -> Self {
        TouchError::Buffer(e)
    }
}

/// Touch transform coefficients A..F
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchTransform {
    pub coefficients: [i32; 6],
}

impl TouchTransform {
    /// Read the matrix currently loaded in the chip
    pub fn read<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<Self, BufferError> {
        let mut coefficients = [0i32; 6];
        for (c, reg) in coefficients.iter_mut().zip(REG_TOUCH_TRANSFORM) {
            *c = buffer.bus_mut().rd32(reg)? as i32;
        }
        Ok(Self { coefficients })
    }

    /// Load this matrix into the chip
    pub fn apply<B: Bus>(&self, buffer: &mut CommandBuffer<B>) -> Result<(), BufferError> {
        for (c, reg) in self.coefficients.iter().zip(REG_TOUCH_TRANSFORM) {
            buffer.bus_mut().wr32(reg, *c as u32)?;
        }
        Ok(())
    }

    /// Serialize into `buf`, returning the used prefix length
    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        postcard::to_slice(self, buf)
            .map(|used| used.len())
            .map_err(|_| ConfigError::BufferTooSmall)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)
    }
}

/// Run the interactive calibration and return the new matrix
///
/// Blocks until the user has tapped all three dots or the drain poll gives
/// up after about 30 s.
pub fn calibrate<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<TouchTransform, TouchError> {
    buffer.start_frame(0x000000)?;
    buffer.color(0xFFFFFF)?;
    buffer.text(240, 136, 28, opt::CENTER, "Tap the dots")?;
    buffer.push_all(&cmd::calibrate())?;

    let poll_us = buffer.config().drain_poll_us.max(1);
    info!("touch: calibrating");
    match buffer.flush_with_retries(CALIBRATE_TIMEOUT_US / poll_us)? {
        Flush::Recovered => return Err(TouchError::Faulted),
        Flush::Empty | Flush::Sent { .. } => {}
    }
    if buffer.last_result()? == 0 {
        warn!("touch: calibration failed");
        return Err(TouchError::Failed);
    }

    let transform = TouchTransform::read(buffer)?;
    debug!("touch: transform {}", transform.coefficients);
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::encode::cmd::op;
    use crate::mock::FakeEve;

    fn buffer() -> CommandBuffer<FakeEve> {
        CommandBuffer::new(FakeEve::new(), EngineConfig::default())
    }

    #[test]
    fn test_calibrate_reads_matrix() {
        let mut buf = buffer();
        for (i, reg) in REG_TOUCH_TRANSFORM.iter().enumerate() {
            buf.bus_mut().poke32(*reg, (i as u32 + 1) * 0x1_0000);
        }
        let transform = calibrate(&mut buf).unwrap();
        assert_eq!(
            transform.coefficients,
            [0x1_0000, 0x2_0000, 0x3_0000, 0x4_0000, 0x5_0000, 0x6_0000]
        );
        assert_eq!(buf.bus().find(op::CALIBRATE, 2).len(), 1);
    }

    #[test]
    fn test_calibrate_fault() {
        let mut buf = buffer();
        buf.bus_mut().fault_next = true;
        assert_eq!(calibrate(&mut buf), Err(TouchError::Faulted));
    }

    #[test]
    fn test_apply_writes_registers() {
        let mut buf = buffer();
        let transform = TouchTransform {
            coefficients: [-1, 2, -3, 4, -5, 6],
        };
        transform.apply(&mut buf).unwrap();
        assert_eq!(buf.bus().peek32(REG_TOUCH_TRANSFORM[0]), u32::MAX);
        assert_eq!(TouchTransform::read(&mut buf).unwrap(), transform);
    }

    #[test]
    fn test_postcard_persistence() {
        let transform = TouchTransform {
            coefficients: [i32::MIN, i32::MAX, 0, -1, 0x8000, 65536],
        };
        let mut buf = [0u8; MAX_TRANSFORM_BYTES];
        let len = transform.to_bytes(&mut buf).unwrap();
        assert_eq!(TouchTransform::from_bytes(&buf[..len]).unwrap(), transform);
    }
}
