//! FT81x / BT81x memory map
//!
//! Addresses are byte offsets in the chip's 22-bit address space. Values
//! must match the datasheet exactly; nothing here is tunable.

/// General purpose graphics RAM
pub const RAM_G: u32 = 0x00_0000;
/// Size of RAM_G in bytes (1 MiB)
pub const RAM_G_SIZE: u32 = 1024 * 1024;
/// Start of the region the coprocessor uses as scratch when decoding PNGs
///
/// Objects placed above this are clobbered by `CMD_LOADIMAGE`.
pub const RAM_G_SCRATCH: u32 = 0x0F_5800;

/// Display list RAM
pub const RAM_DL: u32 = 0x30_0000;
/// Size of display list RAM in bytes
pub const RAM_DL_SIZE: u32 = 8 * 1024;

/// Coprocessor command ring buffer
pub const RAM_CMD: u32 = 0x30_8000;
/// Size of the command ring in bytes
pub const RAM_CMD_SIZE: u32 = 4 * 1024;
/// Free space reported by `REG_CMDB_SPACE` when the ring is empty
pub const CMD_FIFO_SPACE: u32 = RAM_CMD_SIZE - 4;

/// Read pointer value the coprocessor sets when it faults
pub const FAULT_SENTINEL: u32 = 0xFFF;

/// Expected contents of `REG_ID` once the chip has booted
pub const CHIP_ID: u8 = 0x7C;

pub const REG_ID: u32 = 0x30_2000;
pub const REG_FRAMES: u32 = 0x30_2004;
pub const REG_CLOCK: u32 = 0x30_2008;
pub const REG_FREQUENCY: u32 = 0x30_200C;
pub const REG_CPURESET: u32 = 0x30_2020;
pub const REG_HCYCLE: u32 = 0x30_202C;
pub const REG_HOFFSET: u32 = 0x30_2030;
pub const REG_HSIZE: u32 = 0x30_2034;
pub const REG_HSYNC0: u32 = 0x30_2038;
pub const REG_HSYNC1: u32 = 0x30_203C;
pub const REG_VCYCLE: u32 = 0x30_2040;
pub const REG_VOFFSET: u32 = 0x30_2044;
pub const REG_VSIZE: u32 = 0x30_2048;
pub const REG_VSYNC0: u32 = 0x30_204C;
pub const REG_VSYNC1: u32 = 0x30_2050;
pub const REG_DLSWAP: u32 = 0x30_2054;
pub const REG_SWIZZLE: u32 = 0x30_2064;
pub const REG_CSPREAD: u32 = 0x30_2068;
pub const REG_PCLK_POL: u32 = 0x30_206C;
pub const REG_PCLK: u32 = 0x30_2070;
pub const REG_TAG_X: u32 = 0x30_2074;
pub const REG_TAG_Y: u32 = 0x30_2078;
pub const REG_TAG: u32 = 0x30_207C;
pub const REG_GPIO_DIR: u32 = 0x30_2090;
pub const REG_GPIO: u32 = 0x30_2094;
pub const REG_GPIOX_DIR: u32 = 0x30_2098;
pub const REG_GPIOX: u32 = 0x30_209C;
pub const REG_INT_FLAGS: u32 = 0x30_20A8;
pub const REG_INT_EN: u32 = 0x30_20AC;
pub const REG_INT_MASK: u32 = 0x30_20B0;
pub const REG_PWM_HZ: u32 = 0x30_20D0;
pub const REG_PWM_DUTY: u32 = 0x30_20D4;
pub const REG_CMD_READ: u32 = 0x30_20F8;
pub const REG_CMD_WRITE: u32 = 0x30_20FC;
pub const REG_CMD_DL: u32 = 0x30_2100;
pub const REG_TOUCH_MODE: u32 = 0x30_2104;
pub const REG_TOUCH_RAW_XY: u32 = 0x30_211C;
pub const REG_TOUCH_SCREEN_XY: u32 = 0x30_2124;
pub const REG_TOUCH_TAG_XY: u32 = 0x30_2128;
pub const REG_TOUCH_TAG: u32 = 0x30_212C;
pub const REG_TOUCH_TRANSFORM_A: u32 = 0x30_2150;
pub const REG_TOUCH_TRANSFORM_B: u32 = 0x30_2154;
pub const REG_TOUCH_TRANSFORM_C: u32 = 0x30_2158;
pub const REG_TOUCH_TRANSFORM_D: u32 = 0x30_215C;
pub const REG_TOUCH_TRANSFORM_E: u32 = 0x30_2160;
pub const REG_TOUCH_TRANSFORM_F: u32 = 0x30_2164;
pub const REG_CMDB_SPACE: u32 = 0x30_2574;
pub const REG_CMDB_WRITE: u32 = 0x30_2578;
pub const REG_FLASH_STATUS: u32 = 0x30_25F0;
pub const REG_TRACKER: u32 = 0x30_9000;
pub const REG_FLASH_SIZE: u32 = 0x30_9024;
pub const REG_COPRO_PATCH_PTR: u32 = 0x30_9162;

/// The six touch transform registers, A through F
pub const REG_TOUCH_TRANSFORM: [u32; 6] = [
    REG_TOUCH_TRANSFORM_A,
    REG_TOUCH_TRANSFORM_B,
    REG_TOUCH_TRANSFORM_C,
    REG_TOUCH_TRANSFORM_D,
    REG_TOUCH_TRANSFORM_E,
    REG_TOUCH_TRANSFORM_F,
];

/// Interrupt flag bits (`REG_INT_FLAGS`, `REG_INT_MASK`)
pub mod int {
    pub const SWAP: u8 = 0x01;
    pub const TOUCH: u8 = 0x02;
    pub const TAG: u8 = 0x04;
    pub const SOUND: u8 = 0x08;
    pub const PLAYBACK: u8 = 0x10;
    pub const CMDEMPTY: u8 = 0x20;
    pub const CMDFLAG: u8 = 0x40;
    pub const CONVCOMPLETE: u8 = 0x80;
}

/// `REG_FLASH_STATUS` values
pub mod flash_status {
    pub const INIT: u8 = 0;
    pub const DETACHED: u8 = 1;
    pub const BASIC: u8 = 2;
    pub const FULL: u8 = 3;
}
