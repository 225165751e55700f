//! Software timers for the event loop
//!
//! A small deadline list, polled by the engine with the current time in
//! milliseconds. Timers that share a deadline fire in the order they were
//! scheduled.

use heapless::Vec;

/// Most timers pending at once
pub const MAX_TIMERS: usize = 16;

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u32);

/// Errors from scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// No free timer slot
    Full,
    /// Repeating timer with a zero period
    ZeroPeriod,
}

#[derive(Debug, Clone, Copy)]
struct Timer<E> {
    id: TimerId,
    deadline: u64,
    period: Option<u32>,
    event: E,
}

/// Pending one-shot and repeating timers carrying an event `E`
#[derive(Debug)]
pub struct Timers<E: Copy> {
    timers: Vec<Timer<E>, MAX_TIMERS>,
    next_id: u32,
}

impl<E: Copy> Default for Timers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy> Timers<E> {
    pub const fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
        }
    }

    /// Fire `event` once, `delay_ms` after `now_ms`
    pub fn schedule_once(&mut self, now_ms: u64, delay_ms: u32, event: E) -> Result<TimerId, TimerError> {
        self.insert(now_ms + delay_ms as u64, None, event)
    }

    /// Fire `event` every `period_ms`, first one period after `now_ms`
    pub fn schedule_repeating(&mut self, now_ms: u64, period_ms: u32, event: E) -> Result<TimerId, TimerError> {
        if period_ms == 0 {
            return Err(TimerError::ZeroPeriod);
        }
        self.insert(now_ms + period_ms as u64, Some(period_ms), event)
    }

    fn insert(&mut self, deadline: u64, period: Option<u32>, event: E) -> Result<TimerId, TimerError> {
        let id = TimerId(self.next_id);
        self.timers
            .push(Timer {
                id,
                deadline,
                period,
                event,
            })
            .map_err(|_| TimerError::Full)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Stop a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(pos) => {
                self.timers.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Earliest timer due at `now_ms`, if any
    ///
    /// One-shot timers are removed; repeating timers move their deadline
    /// one period on, so a late poll catches up one tick per call.
    pub fn next_expired(&mut self, now_ms: u64) -> Option<(TimerId, E)> {
        let pos = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now_ms)
            .min_by_key(|(_, t)| (t.deadline, t.id.0))
            .map(|(pos, _)| pos)?;

        let timer = &mut self.timers[pos];
        let fired = (timer.id, timer.event);
        match timer.period {
            Some(period) => timer.deadline += period as u64,
            None => {
                self.timers.swap_remove(pos);
            }
        }
        Some(fired)
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
