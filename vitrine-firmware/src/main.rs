//! Vitrine - EVE display firmware
//!
//! Drives an FT81x/BT81x graphics coprocessor from an RP2040: wakes the
//! chip, programs the panel, brings up its flash and touch calibration,
//! then hands the engine to an event-loop task.
//!
//! Named after the glass display case - the picture lives in the chip's
//! memory and the MCU only arranges what goes in it.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::spi::Spi;
use embassy_time::Delay;
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use vitrine_core::bus::{wait_ready, SpiTransport};
use vitrine_core::flash::FlashManager;
use vitrine_core::touch::{self, TouchTransform, MAX_TRANSFORM_BYTES};
use vitrine_core::{Engine, EngineConfig};
use vitrine_hal::SpiConfig;
use vitrine_hal_rp2040::spi::to_embassy;
use vitrine_hal_rp2040::{RpInput, RpOutput, RpSpi};

mod board;
mod channels;
mod screen;
mod tasks;

// Heap for boxed touch handlers and the tag map
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 16KB
const HEAP_SIZE: usize = 16 * 1024;

/// Delay between chip-ready polls (µs)
const READY_POLL_US: u32 = 1000;

/// Touch transform from a previous calibration, as postcard bytes
///
/// Empty means calibrate on every boot; the bytes to paste here are logged
/// after a successful calibration.
const STORED_TOUCH: &[u8] = &[];

static ENGINE: StaticCell<board::EveEngine> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Vitrine firmware starting...");

    // Initialize heap allocator
    init_heap();

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());

    let spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, to_embassy(&SpiConfig::boot()));
    let mut spi = RpSpi::new(spi);
    let mut cs = RpOutput::new(p.PIN_5, true);
    let mut pd = RpOutput::new(p.PIN_6, false);
    let int = RpInput::new(p.PIN_7);

    unwrap!(board::wake(&mut spi, &mut cs, &mut pd).await);

    let config = EngineConfig {
        pclk: board::PANEL.pclk,
        ..Default::default()
    };

    // Slow clock until the chip's PLL is running
    let mut bus = SpiTransport::new(spi, cs, Delay);
    unwrap!(wait_ready(&mut bus, config.ready_retries, READY_POLL_US));
    unwrap!(board::bring_up(&mut bus));
    info!("Panel up");

    let (mut spi, cs, delay) = bus.release();
    spi.set_config(&SpiConfig::running());
    let bus = SpiTransport::new(spi, cs, delay);

    let engine = ENGINE.init(Engine::new(bus, config));

    match FlashManager::init(engine.buffer_mut()) {
        Ok(flash) => info!("Flash attached: {} MiB", flash.size_mib()),
        Err(e) => warn!("No usable flash: {}", e),
    }

    load_touch(engine);

    unwrap!(screen::setup(engine));

    // Spawn tasks
    spawner.spawn(tasks::irq_task(int)).unwrap();
    spawner.spawn(tasks::engine_task(engine)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Apply the stored touch transform, or calibrate and log a new one
fn load_touch(engine: &mut board::EveEngine) {
    if !STORED_TOUCH.is_empty() {
        match TouchTransform::from_bytes(STORED_TOUCH) {
            Ok(transform) => {
                if let Err(e) = transform.apply(engine.buffer_mut()) {
                    warn!("Touch transform not applied: {}", e);
                }
                return;
            }
            Err(e) => warn!("Stored touch transform unreadable: {}", e),
        }
    }

    match touch::calibrate(engine.buffer_mut()) {
        Ok(transform) => {
            let mut buf = [0u8; MAX_TRANSFORM_BYTES];
            match transform.to_bytes(&mut buf) {
                Ok(len) => info!("Touch calibrated, store as STORED_TOUCH: {=[u8]:#x}", &buf[..len]),
                Err(e) => warn!("Touch transform not serialized: {}", e),
            }
        }
        Err(e) => warn!("Touch calibration failed: {}", e),
    }
}
