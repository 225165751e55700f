//! Inter-task communication
//!
//! The interrupt line and the touch handlers run outside the engine task;
//! they hand work to it through these signals.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// The coprocessor pulled INT_N low
pub static EVE_IRQ: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Requested backlight level (0..=128); the engine task fades to it
pub static FADE_REQUEST: Signal<CriticalSectionRawMutex, i32> = Signal::new();
