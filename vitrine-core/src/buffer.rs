//! Command buffer and flow control
//!
//! Words are batched host-side and written to `REG_CMDB_WRITE` in one bus
//! transaction per flush. Two readiness flags model the handshake with the
//! coprocessor:
//!
//! - `buffer_ready`: the pending batch may be mutated (cleared while a flush
//!   is transmitting)
//! - `coprocessor_ready`: the previous batch has drained (cleared while the
//!   chip may still be executing it, and left cleared once the buffer halts)
//!
//! The buffer also keeps a running estimate of how many display list bytes
//! the batch will produce, so a batch never overruns RAM_DL.
//!
//! ```text
//! push ─► pending ─► flush ─► REG_CMDB_WRITE ─► REG_CMD_READ == 0xFFF? ─► recover
//!                                                      │
//!                                                      └─► poll REG_CMDB_SPACE until drained
//! ```

use heapless::Vec;

use crate::bus::{Bus, BusError};
use crate::config::EngineConfig;
use crate::encode::cmd;
use crate::regs::*;

/// Most words a single batch can hold (one full command FIFO)
pub const MAX_BATCH_WORDS: usize = (CMD_FIFO_SPACE / 4) as usize;

/// Errors from the command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Transport failed; the pending batch was dropped
    Bus(BusError),
    /// Batch would overrun display list RAM and was dropped
    DisplayListOverflow { bytes: u32 },
    /// Command does not fit the FIFO; nothing was queued
    FifoOverflow { bytes: u32 },
    /// String operand longer than a widget command accepts
    StringTooLong,
    /// Coprocessor kept faulting; the buffer refuses further work
    Halted,
}

impl From<BusError> for BufferError {
    fn from(e: BusError) -> Self {
        BufferError::Bus(e)
    }
}

/// Outcome of a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flush {
    /// Nothing was pending
    Empty,
    /// Batch was accepted and the FIFO drained
    Sent { words: usize },
    /// Coprocessor faulted and was reset; this batch or one sent
    /// automatically since the previous flush is lost
    Recovered,
}

/// Batching command writer owning the chip bus
pub struct CommandBuffer<B: Bus> {
    bus: B,
    config: EngineConfig,
    pending: Vec<u32, MAX_BATCH_WORDS>,
    /// Display list bytes the pending batch is expected to produce
    dl_estimate: u32,
    buffer_ready: bool,
    coprocessor_ready: bool,
    /// Re-attach flash after a coprocessor reset
    flash_attached: bool,
    consecutive_faults: u8,
    /// An automatic flush from `push`/`push_all` was lost to a reset
    lost_batch: bool,
    halted: bool,
}

impl<B: Bus> CommandBuffer<B> {
    pub fn new(bus: B, config: EngineConfig) -> Self {
        Self {
            bus,
            config,
            pending: Vec::new(),
            dl_estimate: 0,
            buffer_ready: true,
            coprocessor_ready: true,
            flash_attached: false,
            consecutive_faults: 0,
            lost_batch: false,
            halted: false,
        }
    }

    /// Queue one word
    ///
    /// Flushes first when the word would overrun display list RAM or the
    /// FIFO, so long streams go out in several batches.
    pub fn push(&mut self, word: u32) -> Result<(), BufferError> {
        self.wait_buffer()?;
        if self.dl_estimate.saturating_add(4) > RAM_DL_SIZE || self.pending.is_full() {
            trace!("batch full, flushing {} words", self.pending.len());
            self.flush_full()?;
        }
        self.pending.push(word).map_err(|_| BufferError::FifoOverflow {
            bytes: (MAX_BATCH_WORDS as u32 + 1) * 4,
        })?;
        self.dl_estimate += 4;
        Ok(())
    }

    /// Queue a whole command so that it never straddles two batches
    pub fn push_all(&mut self, words: &[u32]) -> Result<(), BufferError> {
        self.wait_buffer()?;
        let bytes = words.len() as u32 * 4;
        if words.len() > MAX_BATCH_WORDS {
            return Err(BufferError::FifoOverflow { bytes });
        }
        let fits_fifo = self.pending.len() + words.len() <= MAX_BATCH_WORDS;
        let fits_dl = self.dl_estimate.saturating_add(bytes) <= RAM_DL_SIZE;
        if !fits_fifo || !fits_dl {
            self.flush_full()?;
        }
        for &word in words {
            // capacity checked above
            let _ = self.pending.push(word);
        }
        self.dl_estimate += bytes;
        Ok(())
    }

    /// Queue an `APPEND` of `count` stored display list bytes at `address`
    ///
    /// The estimate grows by `count - 12`: the three command words are
    /// already counted and do not land in the display list themselves.
    pub fn append(&mut self, address: u32, count: u32) -> Result<(), BufferError> {
        self.push_all(&cmd::append(address, count))?;
        self.dl_estimate = self.dl_estimate.saturating_add(count).saturating_sub(12);
        Ok(())
    }

    /// Queue a chip register write as `CMD_MEMWRITE`
    ///
    /// Ordered with the surrounding commands, unlike a direct bus write.
    pub fn write_reg(&mut self, address: u32, value: u32) -> Result<(), BufferError> {
        let [op, ptr, num] = cmd::memwrite(address, 4);
        self.push_all(&[op, ptr, num, value])
    }

    /// Send the pending batch and wait for the FIFO to drain
    ///
    /// Reports [`Flush::Recovered`] if this batch or any batch `push` sent
    /// on its own since the previous flush was lost.
    pub fn flush(&mut self) -> Result<Flush, BufferError> {
        let retries = self.config.drain_retries as u32;
        self.flush_with_retries(retries)
    }

    /// [`flush`](Self::flush) with a custom drain bound, for commands that
    /// legitimately keep the coprocessor busy (touch calibration)
    pub fn flush_with_retries(&mut self, retries: u32) -> Result<Flush, BufferError> {
        let outcome = self.send(retries)?;
        if core::mem::take(&mut self.lost_batch) {
            return Ok(Flush::Recovered);
        }
        Ok(outcome)
    }

    /// Flush a full batch on behalf of `push`, remembering a loss
    fn flush_full(&mut self) -> Result<(), BufferError> {
        if self.send(self.config.drain_retries as u32)? == Flush::Recovered {
            warn!("automatic flush lost to a coprocessor reset");
            self.lost_batch = true;
        }
        Ok(())
    }

    fn send(&mut self, retries: u32) -> Result<Flush, BufferError> {
        if self.pending.is_empty() {
            return Ok(Flush::Empty);
        }
        if self.dl_estimate > RAM_DL_SIZE {
            let bytes = self.dl_estimate;
            warn!(
                "display list estimate {} exceeds {}, dropping {} words",
                bytes,
                RAM_DL_SIZE,
                self.pending.len()
            );
            self.discard();
            return Err(BufferError::DisplayListOverflow { bytes });
        }

        self.wait_coprocessor()?;
        self.buffer_ready = false;
        self.coprocessor_ready = false;
        match self.transmit(retries) {
            Ok(outcome) => Ok(outcome),
            Err(BufferError::Bus(e)) => {
                error!("bus error during flush, batch dropped");
                self.discard();
                self.buffer_ready = true;
                self.coprocessor_ready = true;
                Err(BufferError::Bus(e))
            }
            Err(e) => Err(e),
        }
    }

    fn transmit(&mut self, retries: u32) -> Result<Flush, BufferError> {
        let words = self.pending.len();
        self.write_words()?;

        if self.bus.rd16(REG_CMD_READ)? as u32 == FAULT_SENTINEL {
            warn!("coprocessor fault after {} words", words);
            return self.recover();
        }

        self.discard();
        self.buffer_ready = true;

        for _ in 0..retries {
            if self.bus.rd16(REG_CMDB_SPACE)? as u32 & 0xFFF == CMD_FIFO_SPACE {
                self.coprocessor_ready = true;
                self.consecutive_faults = 0;
                trace!("flushed {} words", words);
                return Ok(Flush::Sent { words });
            }
            self.bus.delay_us(self.config.drain_poll_us);
        }

        warn!("FIFO did not drain after {} polls", retries);
        self.recover()
    }

    fn write_words(&mut self) -> Result<(), BusError> {
        let mut bytes: Vec<u8, { MAX_BATCH_WORDS * 4 }> = Vec::new();
        for word in &self.pending {
            // sized for a full batch
            let _ = bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.bus.write(REG_CMDB_WRITE, &bytes)
    }

    /// Reset the coprocessor after a fault
    ///
    /// The patch pointer survives the reset; flash is re-attached if it was
    /// attached before.
    fn recover(&mut self) -> Result<Flush, BufferError> {
        self.discard();
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        if self.consecutive_faults > self.config.max_consecutive_faults {
            error!(
                "{} consecutive coprocessor faults, halting",
                self.consecutive_faults
            );
            self.halted = true;
            return Err(BufferError::Halted);
        }

        let patch = self.bus.rd16(REG_COPRO_PATCH_PTR)?;
        self.bus.wr8(REG_CPURESET, 1)?;
        self.bus.wr16(REG_CMD_READ, 0)?;
        self.bus.wr16(REG_CMD_WRITE, 0)?;
        self.bus.wr16(REG_CMD_DL, 0)?;
        self.bus.wr8(REG_CPURESET, 0)?;
        self.bus.wr16(REG_COPRO_PATCH_PTR, patch)?;

        if self.flash_attached {
            let [attach] = cmd::flashattach();
            let [fast, slot] = cmd::flashfast();
            let mut bytes = [0u8; 12];
            for (chunk, word) in bytes.chunks_mut(4).zip([attach, fast, slot]) {
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            self.bus.write(REG_CMDB_WRITE, &bytes)?;
        }

        if self.config.pclk != 0 && self.bus.rd8(REG_PCLK)? == 0 {
            self.bus.wr8(REG_PCLK, self.config.pclk)?;
        }

        info!("coprocessor reset (fault {})", self.consecutive_faults);
        self.buffer_ready = true;
        self.coprocessor_ready = true;
        Ok(Flush::Recovered)
    }

    fn wait_buffer(&self) -> Result<(), BufferError> {
        // Under `&mut self` the flag is only ever cleared for good by a halt
        if self.buffer_ready && !self.halted {
            Ok(())
        } else {
            Err(BufferError::Halted)
        }
    }

    fn wait_coprocessor(&self) -> Result<(), BufferError> {
        if self.coprocessor_ready && !self.halted {
            Ok(())
        } else {
            Err(BufferError::Halted)
        }
    }

    /// Result word the coprocessor wrote into the last slot it consumed
    ///
    /// Valid right after flushing a batch that ended with a command such
    /// as `CMD_FLASHFAST` or `CMD_CALIBRATE`.
    pub fn last_result(&mut self) -> Result<u32, BufferError> {
        let read = self.bus.rd16(REG_CMD_READ)? as u32;
        let slot = read.wrapping_sub(4) & (RAM_CMD_SIZE - 1);
        Ok(self.bus.rd32(RAM_CMD + slot)?)
    }

    /// Drop the pending batch without sending it
    pub fn discard(&mut self) {
        self.pending.clear();
        self.dl_estimate = 0;
    }

    pub fn pending(&self) -> &[u32] {
        &self.pending
    }

    /// Display list bytes the pending batch is expected to produce
    pub fn dl_estimate(&self) -> u32 {
        self.dl_estimate
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Both readiness flags set
    pub fn is_ready(&self) -> bool {
        self.buffer_ready && self.coprocessor_ready && !self.halted
    }

    pub fn consecutive_faults(&self) -> u8 {
        self.consecutive_faults
    }

    pub fn set_flash_attached(&mut self, attached: bool) {
        self.flash_attached = attached;
    }

    pub fn flash_attached(&self) -> bool {
        self.flash_attached
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Direct register access, bypassing the batch
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::dl;
    use crate::mock::FakeEve;

    fn buffer() -> CommandBuffer<FakeEve> {
        CommandBuffer::new(FakeEve::new(), EngineConfig::default())
    }

    #[test]
    fn test_estimate_counts_words() {
        let mut buf = buffer();
        for i in 0..10 {
            buf.push(dl::vertex2f(i, i)).unwrap();
        }
        assert_eq!(buf.dl_estimate(), 40);

        buf.append(0x1000, 100).unwrap();
        // 40 + 12 for the command, then +100 - 12
        assert_eq!(buf.dl_estimate(), 140);
        assert_eq!(buf.pending().len(), 13);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let mut buf = buffer();
        assert_eq!(buf.flush(), Ok(Flush::Empty));
        assert!(buf.bus().batches.is_empty());
    }

    #[test]
    fn test_flush_sends_in_order() {
        let mut buf = buffer();
        let words = [dl::clear(true, true, true), dl::begin(dl::Primitive::Points), dl::end()];
        for w in words {
            buf.push(w).unwrap();
        }
        assert_eq!(buf.flush(), Ok(Flush::Sent { words: 3 }));
        assert_eq!(buf.bus().commands, words);
        assert_eq!(buf.bus().batches, [3]);
        assert_eq!(buf.dl_estimate(), 0);
        assert!(buf.pending().is_empty());
        assert!(buf.is_ready());
    }

    #[test]
    fn test_long_stream_splits_at_fifo() {
        let mut buf = buffer();
        for i in 0..1100u32 {
            buf.push(dl::vertex2f(i as i16, 0)).unwrap();
        }
        buf.flush().unwrap();
        assert_eq!(buf.bus().batches, [MAX_BATCH_WORDS, 1100 - MAX_BATCH_WORDS]);
    }

    #[test]
    fn test_display_list_valve_flushes_before_overrun() {
        let mut buf = buffer();
        buf.append(0x1000, 8000).unwrap();
        assert_eq!(buf.dl_estimate(), 8000);
        for _ in 0..48 {
            buf.push(dl::end()).unwrap();
        }
        assert!(buf.bus().batches.is_empty());
        assert_eq!(buf.dl_estimate(), 8192);

        buf.push(dl::end()).unwrap();
        assert_eq!(buf.bus().batches, [51]);
        assert_eq!(buf.dl_estimate(), 4);
    }

    #[test]
    fn test_display_list_overflow_drops_batch() {
        let mut buf = buffer();
        buf.append(0x1000, 9000).unwrap();
        assert_eq!(
            buf.flush(),
            Err(BufferError::DisplayListOverflow { bytes: 9000 })
        );
        assert!(buf.pending().is_empty());
        assert!(buf.bus().batches.is_empty());
        // buffer is usable afterwards
        buf.push(dl::end()).unwrap();
        assert_eq!(buf.flush(), Ok(Flush::Sent { words: 1 }));
    }

    #[test]
    fn test_oversized_command_is_refused() {
        let mut buf = buffer();
        buf.push(dl::end()).unwrap();
        let big = [0u32; MAX_BATCH_WORDS + 1];
        assert_eq!(
            buf.push_all(&big),
            Err(BufferError::FifoOverflow { bytes: 4096 })
        );
        // earlier work is still queued
        assert_eq!(buf.pending(), [dl::end()]);
    }

    #[test]
    fn test_command_never_straddles_batches() {
        let mut buf = buffer();
        for _ in 0..MAX_BATCH_WORDS - 2 {
            buf.push(dl::end()).unwrap();
        }
        buf.push_all(&cmd::memcpy(0, 100, 4)).unwrap();
        assert_eq!(buf.bus().batches, [MAX_BATCH_WORDS - 2]);
        assert_eq!(buf.pending().len(), 4);
    }

    #[test]
    fn test_fault_recovery_resets_state() {
        let mut buf = buffer();
        buf.bus_mut().poke16(REG_COPRO_PATCH_PTR, 0x2345);
        buf.push(dl::end()).unwrap();
        buf.bus_mut().fault_next = true;

        assert_eq!(buf.flush(), Ok(Flush::Recovered));
        assert!(buf.pending().is_empty());
        assert_eq!(buf.dl_estimate(), 0);
        assert!(buf.is_ready());
        assert_eq!(buf.consecutive_faults(), 1);

        let resets: std::vec::Vec<u32> = buf
            .bus()
            .writes
            .iter()
            .filter(|(a, _)| *a == REG_CPURESET)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(resets, [1, 0]);
        assert_eq!(buf.bus().peek16(REG_COPRO_PATCH_PTR), 0x2345);
        assert_eq!(buf.bus().peek32(REG_CMD_READ), 0);

        buf.push(dl::end()).unwrap();
        assert_eq!(buf.flush(), Ok(Flush::Sent { words: 1 }));
        assert_eq!(buf.consecutive_faults(), 0);
    }

    #[test]
    fn test_recovery_reattaches_flash() {
        let mut buf = buffer();
        buf.set_flash_attached(true);
        buf.push(dl::end()).unwrap();
        buf.bus_mut().fault_next = true;
        buf.flush().unwrap();

        let tail = &buf.bus().commands[1..];
        assert_eq!(tail, [cmd::op::FLASHATTACH, cmd::op::FLASHFAST, 0]);
    }

    #[test]
    fn test_recovery_restores_pixel_clock() {
        let config = EngineConfig {
            pclk: 2,
            ..Default::default()
        };
        let mut buf = CommandBuffer::new(FakeEve::new(), config);
        buf.push(dl::end()).unwrap();
        buf.bus_mut().fault_next = true;
        buf.flush().unwrap();
        assert_eq!(buf.bus().peek8(REG_PCLK), 2);
    }

    #[test]
    fn test_lost_automatic_flush_reported_on_next_flush() {
        let mut buf = buffer();
        for _ in 0..MAX_BATCH_WORDS {
            buf.push(dl::end()).unwrap();
        }
        buf.bus_mut().fault_next = true;
        // batch is full, so this push sends it and the chip resets
        buf.push(dl::end()).unwrap();
        assert_eq!(buf.bus().batches, [MAX_BATCH_WORDS]);
        assert_eq!(buf.pending().len(), 1);

        assert_eq!(buf.flush(), Ok(Flush::Recovered));
        assert_eq!(buf.bus().batches, [MAX_BATCH_WORDS, 1]);

        buf.push(dl::end()).unwrap();
        assert_eq!(buf.flush(), Ok(Flush::Sent { words: 1 }));
    }

    #[test]
    fn test_lost_automatic_flush_with_nothing_pending() {
        let mut buf = buffer();
        for _ in 0..MAX_BATCH_WORDS - 1 {
            buf.push(dl::end()).unwrap();
        }
        buf.bus_mut().fault_next = true;
        buf.push_all(&cmd::memzero(0, 16)).unwrap();
        buf.discard();
        assert_eq!(buf.flush(), Ok(Flush::Recovered));
        assert_eq!(buf.flush(), Ok(Flush::Empty));
    }

    #[test]
    fn test_append_estimate_saturates() {
        let mut buf = buffer();
        buf.push(dl::end()).unwrap();
        buf.append(0x1000, u32::MAX).unwrap();
        assert_eq!(buf.dl_estimate(), u32::MAX - 12);
        assert_eq!(
            buf.flush(),
            Err(BufferError::DisplayListOverflow { bytes: u32::MAX - 12 })
        );
    }

    #[test]
    fn test_stalled_fifo_counts_as_fault() {
        let mut buf = buffer();
        buf.bus_mut().stall = true;
        buf.push(dl::end()).unwrap();
        assert_eq!(buf.flush(), Ok(Flush::Recovered));
        let config = EngineConfig::default();
        assert_eq!(
            buf.bus().delay_total_us,
            config.drain_retries as u64 * config.drain_poll_us as u64
        );
    }

    #[test]
    fn test_repeated_faults_halt() {
        let config = EngineConfig {
            max_consecutive_faults: 2,
            ..Default::default()
        };
        let mut buf = CommandBuffer::new(FakeEve::new(), config);
        for _ in 0..2 {
            buf.push(dl::end()).unwrap();
            buf.bus_mut().fault_next = true;
            assert_eq!(buf.flush(), Ok(Flush::Recovered));
        }
        buf.push(dl::end()).unwrap();
        buf.bus_mut().fault_next = true;
        assert_eq!(buf.flush(), Err(BufferError::Halted));
        assert!(buf.is_halted());
        assert_eq!(buf.push(dl::end()), Err(BufferError::Halted));
    }

    #[test]
    fn test_bus_error_drops_batch() {
        let mut buf = buffer();
        buf.push(dl::end()).unwrap();
        buf.bus_mut().fail_bus = true;
        assert_eq!(buf.flush(), Err(BufferError::Bus(BusError::Spi)));
        assert!(buf.pending().is_empty());
        assert!(buf.is_ready());
    }

    #[test]
    fn test_write_reg_is_memwrite() {
        let mut buf = buffer();
        buf.write_reg(REG_PWM_DUTY, 64).unwrap();
        buf.flush().unwrap();
        assert_eq!(buf.bus().peek8(REG_PWM_DUTY), 64);
        assert_eq!(
            buf.bus().commands,
            [cmd::op::MEMWRITE, REG_PWM_DUTY, 4, 64]
        );
    }
}
