//! Engine event loop
//!
//! Owns the engine and sleeps until the interrupt line fires, a fade is
//! requested or the next timer is due, then runs everything that is
//! ready. Handlers never overlap.

use defmt::*;
use embassy_futures::select::{select3, Either3};
use embassy_time::{Instant, Timer};
use vitrine_core::bus::Bus;
use vitrine_core::engine::BACKLIGHT_MAX;
use vitrine_core::regs::REG_PWM_DUTY;

use crate::board::EveEngine;
use crate::channels::{EVE_IRQ, FADE_REQUEST};

/// Backlight fade length and step
const FADE_MS: u32 = 300;
const FADE_STEP_MS: u32 = 15;

#[embassy_executor::task]
pub async fn engine_task(engine: &'static mut EveEngine) {
    info!("Engine task started");

    loop {
        let now_ms = Instant::now().as_millis();
        if let Err(e) = engine.run(now_ms) {
            warn!("Event failed: {}", e);
        }

        if engine.buffer().is_halted() {
            error!("Coprocessor halted after repeated faults");
            core::future::pending::<()>().await;
        }

        let deadline = engine
            .next_deadline()
            .map(Instant::from_millis)
            .unwrap_or(Instant::MAX);

        match select3(EVE_IRQ.wait(), FADE_REQUEST.wait(), Timer::at(deadline)).await {
            Either3::First(()) => {
                if let Err(e) = engine.post_interrupt() {
                    warn!("Interrupt dropped: {}", e);
                }
            }
            Either3::Second(level) => start_fade(engine, level),
            Either3::Third(()) => {}
        }
    }
}

fn start_fade(engine: &mut EveEngine, level: i32) {
    // fade from wherever the backlight is now, including mid-fade
    let from = match engine.buffer_mut().bus_mut().rd8(REG_PWM_DUTY) {
        Ok(duty) => duty as i32,
        Err(_) => BACKLIGHT_MAX,
    };
    let now_ms = Instant::now().as_millis();
    match engine.backlight_fade(now_ms, from, level, FADE_MS, FADE_STEP_MS) {
        Ok(_) => debug!("Backlight fade {} -> {}", from, level),
        Err(e) => warn!("Backlight fade failed: {}", e),
    }
}
