//! Demo screen
//!
//! A badge stored once in RAM_G and replayed every frame, plus a button
//! that toggles the backlight between full and dim.

use defmt::*;
use embassy_time::Instant;
use vitrine_core::buffer::Flush;
use vitrine_core::canvas::CanvasExt;
use vitrine_core::encode::cmd::{self, opt};
use vitrine_core::engine::BACKLIGHT_MAX;
use vitrine_core::{CommandBuffer, EngineError, ObjectId, RamG};

use crate::board::{EveBus, EveEngine, PANEL};
use crate::channels::FADE_REQUEST;

const BACKGROUND: u32 = 0x101820;
const ACCENT: u32 = 0x40C0FF;
const WHITE: u32 = 0xFFFFFF;

/// Backlight level while dimmed
pub const DIM_LEVEL: i32 = 16;

/// Fade-in on first frame
const FADE_IN_MS: u32 = 600;
const FADE_STEP_MS: u32 = 20;

/// Build the badge, subscribe the button and show the first frame
pub fn setup(engine: &mut EveEngine) -> Result<(), EngineError> {
    let (buffer, ramg, router) = engine.parts();

    buffer.push_all(&cmd::dlstart())?;
    buffer.color(ACCENT)?;
    buffer.rectangle(40, 40, 260, 80, 8)?;
    buffer.color(WHITE)?;
    buffer.text(170, 80, 30, opt::CENTER, "vitrine")?;
    let badge = ramg.save_display_list(buffer, "badge")?;
    if badge.is_none() {
        warn!("Badge display list came out empty");
    }

    let mut dimmed = false;
    let dim_tag = router.attach(buffer, None, move |_: &mut CommandBuffer<EveBus>, _: u8| {
        dimmed = !dimmed;
        FADE_REQUEST.signal(if dimmed { DIM_LEVEL } else { BACKLIGHT_MAX });
    })?;
    info!("Dim button on tag {}", dim_tag);

    draw(buffer, ramg, badge, dim_tag)?;

    engine.backlight_fade(Instant::now().as_millis(), 0, BACKLIGHT_MAX, FADE_IN_MS, FADE_STEP_MS)?;
    Ok(())
}

fn draw(
    buffer: &mut CommandBuffer<EveBus>,
    ramg: &RamG,
    badge: Option<ObjectId>,
    dim_tag: u8,
) -> Result<(), EngineError> {
    let cx = (PANEL.hsize / 2) as i16;

    buffer.start_frame(BACKGROUND)?;
    if let Some(badge) = badge {
        ramg.call(buffer, badge)?;
    }
    buffer.color(WHITE)?;
    buffer.text(cx, 200, 28, opt::CENTER, "Tap to dim the backlight")?;
    buffer.fgcolor(0x305070)?;
    buffer.tag(dim_tag)?;
    buffer.button(cx - 100, 300, 200, 64, 29, 0, "Dim")?;
    buffer.tag(0)?;
    buffer.finish_frame()?;

    if let Flush::Recovered = buffer.flush()? {
        warn!("First frame lost to a coprocessor reset");
    }
    Ok(())
}
