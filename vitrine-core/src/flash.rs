//! External flash attached to the coprocessor
//!
//! The chip owns the flash; the host only drives its state machine and
//! asks the coprocessor to move data between flash and RAM_G.
//!
//! ```text
//! Init ──► Detached ──FLASHATTACH──► Basic ──FLASHFAST──► Full
//! ```
//!
//! A [`FlashManager`] only exists once the chip reports `Full`.

use crate::buffer::{BufferError, CommandBuffer, Flush};
use crate::bus::Bus;
use crate::encode::cmd;
use crate::regs::{flash_status, REG_FLASH_SIZE, REG_FLASH_STATUS};

/// Flash transfers move whole 64-byte blocks
pub const FLASH_BLOCK: u32 = 64;
/// Erase/update granularity of the flash chip
pub const FLASH_SECTOR: u32 = 4096;

/// Flash state reported by `REG_FLASH_STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashState {
    Init,
    Detached,
    Basic,
    Full,
}

impl FlashState {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            flash_status::DETACHED => FlashState::Detached,
            flash_status::BASIC => FlashState::Basic,
            flash_status::FULL => FlashState::Full,
            _ => FlashState::Init,
        }
    }
}

/// Errors from flash bring-up and transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    Buffer(BufferError),
    /// Attach did not reach basic mode
    AttachFailed(FlashState),
    /// `CMD_FLASHFAST` returned a non-zero code
    FastModeFailed(u32),
    /// Status never settled
    Timeout,
    /// Coprocessor was reset while the command ran
    Faulted,
    /// Address or length not aligned as the transfer requires
    Misaligned,
}

impl From<BufferError> for FlashError {
    fn from(e: BufferError) -> Self {
        FlashError::Buffer(e)
    }
}

/// Handle to a flash in full-speed mode
#[derive(Debug)]
pub struct FlashManager {
    size_mib: u32,
}

impl FlashManager {
    /// Drive the flash into full-speed mode
    ///
    /// Polls `REG_FLASH_STATUS` up to `flash_retries` times. Attach is tried
    /// once; a failed attach or fast-mode request ends bring-up.
    pub fn init<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<Self, FlashError> {
        let retries = buffer.config().flash_retries;
        let poll_us = buffer.config().flash_poll_us;
        let mut attach_tried = false;

        for _ in 0..retries {
            let state = read_state(buffer)?;
            match state {
                FlashState::Init => buffer.bus_mut().delay_us(poll_us),
                FlashState::Detached if !attach_tried => {
                    attach_tried = true;
                    debug!("flash: attaching");
                    buffer.push_all(&cmd::flashattach())?;
                    run(buffer)?;
                    let next = read_state(buffer)?;
                    if next != FlashState::Basic {
                        error!("flash: attach left status {}", next as u8);
                        return Err(FlashError::AttachFailed(next));
                    }
                }
                FlashState::Detached => return Err(FlashError::AttachFailed(state)),
                FlashState::Basic => {
                    debug!("flash: entering fast mode");
                    buffer.push_all(&cmd::flashfast())?;
                    run(buffer)?;
                    let code = buffer.last_result()?;
                    if code != 0 {
                        error!("flash: fast mode failed with {:#x}", code);
                        return Err(FlashError::FastModeFailed(code));
                    }
                }
                FlashState::Full => {
                    let size_mib = buffer
                        .bus_mut()
                        .rd32(REG_FLASH_SIZE)
                        .map_err(BufferError::from)?;
                    buffer.set_flash_attached(true);
                    info!("flash: ready, {} MiB", size_mib);
                    return Ok(Self { size_mib });
                }
            }
        }

        warn!("flash: status did not settle after {} polls", retries);
        Err(FlashError::Timeout)
    }

    pub fn size_mib(&self) -> u32 {
        self.size_mib
    }

    /// Copy `len` bytes from flash offset `src` to RAM_G address `dst`
    ///
    /// `dst` and `src` must be 64-byte aligned, `len` a multiple of 4.
    pub fn read_to_ramg<B: Bus>(
        &self,
        buffer: &mut CommandBuffer<B>,
        dst: u32,
        src: u32,
        len: u32,
    ) -> Result<(), FlashError> {
        if dst % FLASH_BLOCK != 0 || src % FLASH_BLOCK != 0 || len % 4 != 0 {
            return Err(FlashError::Misaligned);
        }
        buffer.push_all(&cmd::flashread(dst, src, len))?;
        run(buffer)
    }

    /// Write `len` bytes from RAM_G `src` to flash offset `dst`, erasing
    /// only sectors whose contents differ
    ///
    /// `dst` must be sector aligned, `src` 4-byte aligned, `len` a multiple
    /// of the sector size.
    pub fn update_from_ramg<B: Bus>(
        &self,
        buffer: &mut CommandBuffer<B>,
        dst: u32,
        src: u32,
        len: u32,
    ) -> Result<(), FlashError> {
        if dst % FLASH_SECTOR != 0 || src % 4 != 0 || len % FLASH_SECTOR != 0 {
            return Err(FlashError::Misaligned);
        }
        buffer.push_all(&cmd::flashupdate(dst, src, len))?;
        run(buffer)
    }

    /// Erase the whole flash
    pub fn erase<B: Bus>(&self, buffer: &mut CommandBuffer<B>) -> Result<(), FlashError> {
        buffer.push_all(&cmd::flasherase())?;
        run(buffer)
    }
}

fn read_state<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<FlashState, FlashError> {
    let raw = buffer
        .bus_mut()
        .rd8(REG_FLASH_STATUS)
        .map_err(BufferError::from)?;
    Ok(FlashState::from_raw(raw))
}

fn run<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<(), FlashError> {
    match buffer.flush()? {
        Flush::Recovered => Err(FlashError::Faulted),
        Flush::Empty | Flush::Sent { .. } => Ok(()),
    }
}
