//! Board wiring and panel bring-up
//!
//! Pin assignment (RP2040):
//!
//! | signal | pin    |
//! |--------|--------|
//! | SCK    | GPIO2  |
//! | MOSI   | GPIO3  |
//! | MISO   | GPIO4  |
//! | CS_N   | GPIO5  |
//! | PD_N   | GPIO6  |
//! | INT_N  | GPIO7  |
//!
//! Timings are for an 800x480 panel.

use defmt::*;
use embassy_rp::peripherals::SPI0;
use embassy_time::{Delay, Timer};
use vitrine_core::bus::{Bus, BusError, SpiTransport};
use vitrine_core::encode::dl;
use vitrine_core::regs::*;
use vitrine_core::Engine;
use vitrine_hal::{OutputPin, SpiBus};
use vitrine_hal_rp2040::{RpOutput, RpSpi};

pub type EveBus = SpiTransport<RpSpi<'static, SPI0>, RpOutput<'static>, Delay>;
pub type EveEngine = Engine<EveBus>;

/// Host commands; three raw bytes outside the register protocol
mod host {
    pub const ACTIVE: u8 = 0x00;
    pub const CLKEXT: u8 = 0x44;
}

/// Panel timing registers
pub struct Panel {
    pub hsize: u16,
    pub vsize: u16,
    pub hcycle: u16,
    pub hoffset: u16,
    pub hsync0: u16,
    pub hsync1: u16,
    pub vcycle: u16,
    pub voffset: u16,
    pub vsync0: u16,
    pub vsync1: u16,
    pub swizzle: u8,
    pub pclk_pol: u8,
    pub cspread: u8,
    /// Pixel clock divisor, written last
    pub pclk: u8,
}

pub const PANEL: Panel = Panel {
    hsize: 800,
    vsize: 480,
    hcycle: 928,
    hoffset: 88,
    hsync0: 0,
    hsync1: 48,
    vcycle: 525,
    voffset: 32,
    vsync0: 0,
    vsync1: 3,
    swizzle: 0,
    pclk_pol: 1,
    cspread: 0,
    pclk: 2,
};

/// `REG_GPIO` bit driving the panel's DISP line
const GPIO_DISP: u8 = 0x80;

/// `REG_DLSWAP` value: swap after the current frame
const DLSWAP_FRAME: u8 = 2;

/// Power-cycle the chip and start its clock from the external crystal
pub async fn wake(
    spi: &mut RpSpi<'static, SPI0>,
    cs: &mut RpOutput<'static>,
    pd: &mut RpOutput<'static>,
) -> Result<(), BusError> {
    pd.set_low();
    Timer::after_millis(20).await;
    pd.set_high();
    Timer::after_millis(20).await;

    host_command(spi, cs, host::CLKEXT)?;
    host_command(spi, cs, host::ACTIVE)?;
    Timer::after_millis(300).await;
    Ok(())
}

fn host_command(
    spi: &mut RpSpi<'static, SPI0>,
    cs: &mut RpOutput<'static>,
    command: u8,
) -> Result<(), BusError> {
    cs.set_low();
    let result = spi.write(&[command, 0, 0]);
    cs.set_high();
    result.map_err(|_| {
        warn!("host command {=u8:#x} failed", command);
        BusError::Spi
    })
}

/// Program the panel timings and show a blank frame with the backlight off
///
/// The pixel clock is enabled last; everything before it configures a
/// stopped display.
pub fn bring_up<B: Bus>(bus: &mut B) -> Result<(), BusError> {
    let p = &PANEL;
    let timings: [(u32, u16); 10] = [
        (REG_HCYCLE, p.hcycle),
        (REG_HOFFSET, p.hoffset),
        (REG_HSYNC0, p.hsync0),
        (REG_HSYNC1, p.hsync1),
        (REG_VCYCLE, p.vcycle),
        (REG_VOFFSET, p.voffset),
        (REG_VSYNC0, p.vsync0),
        (REG_VSYNC1, p.vsync1),
        (REG_HSIZE, p.hsize),
        (REG_VSIZE, p.vsize),
    ];
    for (reg, value) in timings {
        bus.wr16(reg, value)?;
    }
    bus.wr8(REG_SWIZZLE, p.swizzle)?;
    bus.wr8(REG_PCLK_POL, p.pclk_pol)?;
    bus.wr8(REG_CSPREAD, p.cspread)?;
    bus.wr8(REG_PWM_DUTY, 0)?;

    bus.wr32(RAM_DL, dl::clear_color_rgb(0x000000))?;
    bus.wr32(RAM_DL + 4, dl::clear(true, true, true))?;
    bus.wr32(RAM_DL + 8, dl::display())?;
    bus.wr8(REG_DLSWAP, DLSWAP_FRAME)?;

    let dir = bus.rd8(REG_GPIO_DIR)?;
    bus.wr8(REG_GPIO_DIR, dir | GPIO_DISP)?;
    let gpio = bus.rd8(REG_GPIO)?;
    bus.wr8(REG_GPIO, gpio | GPIO_DISP)?;

    bus.wr8(REG_PCLK, p.pclk)
}
