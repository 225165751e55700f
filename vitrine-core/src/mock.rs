//! In-memory stand-in for an EVE chip
//!
//! Interprets enough of the coprocessor command set to check what the
//! engine does to chip memory: display-list words, memory commands, flash
//! attach/fast, snapshots and sketches. Everything else is logged and
//! skipped.

use std::collections::BTreeMap;
use std::vec::Vec;

use crate::bus::{Bus, BusError};
use crate::encode::cmd::op;
use crate::regs::*;

pub struct FakeEve {
    mem: BTreeMap<u32, u8>,
    pub ramg: Vec<u8>,
    /// Every word written through `REG_CMDB_WRITE`, in order
    pub commands: Vec<u32>,
    /// Word count of each `REG_CMDB_WRITE` transaction
    pub batches: Vec<usize>,
    /// Direct register writes as (address, value)
    pub writes: Vec<(u32, u32)>,
    /// Next batch leaves the read pointer at the fault sentinel
    pub fault_next: bool,
    /// Command FIFO never drains
    pub stall: bool,
    /// Every bus access fails
    pub fail_bus: bool,
    /// Flash status reported after `CMD_FLASHATTACH`
    pub attach_status: u8,
    /// Result code written for `CMD_FLASHFAST`
    pub fast_result: u32,
    /// Byte the next snapshot/sketch fills its target with
    pub fill: u8,
    pub delay_total_us: u64,
    write_ptr: u32,
    pending: Vec<u32>,
    /// RAM_CMD offset of the word at `pending[0]`
    pending_at: u32,
}

impl FakeEve {
    pub fn new() -> Self {
        let mut chip = Self {
            mem: BTreeMap::new(),
            ramg: std::vec![0; RAM_G_SIZE as usize],
            commands: Vec::new(),
            batches: Vec::new(),
            writes: Vec::new(),
            fault_next: false,
            stall: false,
            fail_bus: false,
            attach_status: flash_status::BASIC,
            fast_result: 0,
            fill: 0x5A,
            delay_total_us: 0,
            write_ptr: 0,
            pending: Vec::new(),
            pending_at: 0,
        };
        chip.poke8(REG_ID, CHIP_ID);
        chip.poke8(REG_FLASH_STATUS, flash_status::DETACHED);
        chip
    }

    pub fn peek8(&self, address: u32) -> u8 {
        if address < RAM_G_SIZE {
            self.ramg[address as usize]
        } else {
            self.mem.get(&address).copied().unwrap_or(0)
        }
    }

    pub fn peek16(&self, address: u32) -> u16 {
        u16::from_le_bytes([self.peek8(address), self.peek8(address + 1)])
    }

    pub fn poke16(&mut self, address: u32, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.poke8(address, lo);
        self.poke8(address + 1, hi);
    }

    pub fn peek32(&self, address: u32) -> u32 {
        u32::from_le_bytes([
            self.peek8(address),
            self.peek8(address + 1),
            self.peek8(address + 2),
            self.peek8(address + 3),
        ])
    }

    pub fn poke8(&mut self, address: u32, value: u8) {
        if address < RAM_G_SIZE {
            self.ramg[address as usize] = value;
        } else {
            self.mem.insert(address, value);
        }
    }

    pub fn poke32(&mut self, address: u32, value: u32) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.poke8(address + i as u32, *b);
        }
    }

    /// Latch interrupt flags as if the chip had raised them
    pub fn raise(&mut self, flags: u8) {
        let current = self.peek8(REG_INT_FLAGS);
        self.poke8(REG_INT_FLAGS, current | flags);
    }

    /// Commands seen so far that start with `opcode`, with their operands
    pub fn find(&self, opcode: u32, arity: usize) -> Vec<Vec<u32>> {
        let mut found = Vec::new();
        let mut i = 0;
        while i < self.commands.len() {
            if self.commands[i] == opcode && i + arity <= self.commands.len() {
                found.push(self.commands[i + 1..i + arity].to_vec());
                i += arity;
            } else {
                i += 1;
            }
        }
        found
    }

    fn push_word(&mut self, word: u32) {
        self.commands.push(word);
        if self.pending.is_empty() {
            self.pending_at = self.write_ptr;
        }
        self.poke32(RAM_CMD + self.write_ptr, word);
        self.write_ptr = (self.write_ptr + 4) & (RAM_CMD_SIZE - 1);
        self.pending.push(word);
        self.execute();
    }

    fn arity(&self) -> Option<usize> {
        let p = &self.pending;
        let n = match p[0] {
            op::DLSTART | op::FLASHATTACH | op::FLASHERASE => 1,
            op::FLASHFAST | op::CALIBRATE | op::INFLATE => 2,
            op::MEMZERO | op::APPEND | op::LOADIMAGE => 3,
            op::MEMCPY | op::MEMSET | op::TRACK | op::FLASHREAD | op::FLASHUPDATE => 4,
            op::SNAPSHOT2 | op::SKETCH => 5,
            op::MEMWRITE => {
                if p.len() < 3 {
                    return None;
                }
                3 + ((p[2] as usize + 3) / 4)
            }
            _ => 1,
        };
        Some(n)
    }

    fn execute(&mut self) {
        match self.arity() {
            Some(n) if self.pending.len() >= n => {}
            _ => return,
        }
        let p = core::mem::take(&mut self.pending);
        match p[0] {
            op::DLSTART => self.poke32(REG_CMD_DL, 0),
            op::MEMZERO => self.fill_range(p[1], p[2], 0),
            op::MEMSET => self.fill_range(p[1], p[3], p[2] as u8),
            op::MEMCPY => {
                let bytes: Vec<u8> = (0..p[3]).map(|i| self.peek8(p[2] + i)).collect();
                for (i, b) in bytes.iter().enumerate() {
                    self.poke8(p[1] + i as u32, *b);
                }
            }
            op::MEMWRITE => {
                let bytes: Vec<u8> = p[3..].iter().flat_map(|w| w.to_le_bytes()).collect();
                for i in 0..p[2] {
                    self.poke8(p[1] + i, bytes[i as usize]);
                }
            }
            op::APPEND => {
                let dl = self.peek32(REG_CMD_DL);
                self.poke32(REG_CMD_DL, dl + p[2]);
            }
            op::SNAPSHOT2 => {
                let w = p[4] & 0xFFFF;
                let h = p[4] >> 16;
                let bpp = if p[1] == 0x20 { 4 } else { 2 };
                self.fill_range(p[2], w * h * bpp, self.fill);
            }
            op::FLASHATTACH => self.poke8(REG_FLASH_STATUS, self.attach_status),
            op::FLASHFAST => {
                let slot = (self.pending_at + 4) & (RAM_CMD_SIZE - 1);
                self.poke32(RAM_CMD + slot, self.fast_result);
                if self.fast_result == 0 {
                    self.poke8(REG_FLASH_STATUS, flash_status::FULL);
                }
            }
            op::CALIBRATE => {
                let slot = (self.pending_at + 4) & (RAM_CMD_SIZE - 1);
                self.poke32(RAM_CMD + slot, 1);
            }
            word if word & 0xFFFF_FF00 != 0xFFFF_FF00 => {
                let dl = self.peek32(REG_CMD_DL);
                self.poke32(RAM_DL + dl, word);
                self.poke32(REG_CMD_DL, dl + 4);
            }
            _ => {}
        }
    }

    fn fill_range(&mut self, address: u32, len: u32, value: u8) {
        for i in 0..len {
            self.poke8(address + i, value);
        }
    }
}

impl Bus for FakeEve {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError> {
        if self.fail_bus {
            return Err(BusError::Spi);
        }
        match address {
            REG_CMDB_SPACE => {
                let space = if self.stall { 0 } else { CMD_FIFO_SPACE };
                buf.copy_from_slice(&space.to_le_bytes()[..buf.len()]);
            }
            REG_INT_FLAGS => {
                buf[0] = self.peek8(REG_INT_FLAGS);
                self.poke8(REG_INT_FLAGS, 0);
            }
            _ => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.peek8(address + i as u32);
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
        if self.fail_bus {
            return Err(BusError::Spi);
        }
        if address == REG_CMDB_WRITE {
            let words: Vec<u32> = data
                .chunks(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            self.batches.push(words.len());
            for word in words {
                self.push_word(word);
            }
            self.poke32(REG_CMD_WRITE, self.write_ptr);
            let read = if self.fault_next {
                self.fault_next = false;
                FAULT_SENTINEL
            } else {
                self.write_ptr
            };
            self.poke32(REG_CMD_READ, read);
            return Ok(());
        }

        let mut value = [0u8; 4];
        let n = data.len().min(4);
        value[..n].copy_from_slice(&data[..n]);
        self.writes.push((address, u32::from_le_bytes(value)));
        for (i, b) in data.iter().enumerate() {
            self.poke8(address + i as u32, *b);
        }
        if address == REG_CMD_WRITE {
            self.write_ptr = u32::from_le_bytes(value) & (RAM_CMD_SIZE - 1);
            self.pending.clear();
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_total_us += us as u64;
    }
}
