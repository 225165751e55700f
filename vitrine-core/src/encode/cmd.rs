//! Coprocessor commands
//!
//! Every command starts with a `0xFFFFFFxx` opcode word followed by its
//! operands. 16-bit operand pairs share one word, first operand in the low
//! half. Builders here return fixed-size word arrays; commands that carry
//! a string or inline payload return the header only and the caller
//! follows it with [`pack_str`] or [`pack_bytes`].

/// Opcode words
pub mod op {
    pub const DLSTART: u32 = 0xFFFF_FF00;
    pub const SWAP: u32 = 0xFFFF_FF01;
    pub const INTERRUPT: u32 = 0xFFFF_FF02;
    pub const BGCOLOR: u32 = 0xFFFF_FF09;
    pub const FGCOLOR: u32 = 0xFFFF_FF0A;
    pub const GRADIENT: u32 = 0xFFFF_FF0B;
    pub const TEXT: u32 = 0xFFFF_FF0C;
    pub const BUTTON: u32 = 0xFFFF_FF0D;
    pub const KEYS: u32 = 0xFFFF_FF0E;
    pub const PROGRESS: u32 = 0xFFFF_FF0F;
    pub const SLIDER: u32 = 0xFFFF_FF10;
    pub const SCROLLBAR: u32 = 0xFFFF_FF11;
    pub const TOGGLE: u32 = 0xFFFF_FF12;
    pub const GAUGE: u32 = 0xFFFF_FF13;
    pub const CLOCK: u32 = 0xFFFF_FF14;
    pub const CALIBRATE: u32 = 0xFFFF_FF15;
    pub const SPINNER: u32 = 0xFFFF_FF16;
    pub const STOP: u32 = 0xFFFF_FF17;
    pub const MEMCRC: u32 = 0xFFFF_FF18;
    pub const REGREAD: u32 = 0xFFFF_FF19;
    pub const MEMWRITE: u32 = 0xFFFF_FF1A;
    pub const MEMSET: u32 = 0xFFFF_FF1B;
    pub const MEMZERO: u32 = 0xFFFF_FF1C;
    pub const MEMCPY: u32 = 0xFFFF_FF1D;
    pub const APPEND: u32 = 0xFFFF_FF1E;
    pub const SNAPSHOT: u32 = 0xFFFF_FF1F;
    pub const INFLATE: u32 = 0xFFFF_FF22;
    pub const GETPTR: u32 = 0xFFFF_FF23;
    pub const LOADIMAGE: u32 = 0xFFFF_FF24;
    pub const TRACK: u32 = 0xFFFF_FF2C;
    pub const DIAL: u32 = 0xFFFF_FF2D;
    pub const NUMBER: u32 = 0xFFFF_FF2E;
    pub const SKETCH: u32 = 0xFFFF_FF30;
    pub const LOGO: u32 = 0xFFFF_FF31;
    pub const COLDSTART: u32 = 0xFFFF_FF32;
    pub const GRADCOLOR: u32 = 0xFFFF_FF34;
    pub const SNAPSHOT2: u32 = 0xFFFF_FF37;
    pub const SETBITMAP: u32 = 0xFFFF_FF43;
    pub const FLASHERASE: u32 = 0xFFFF_FF44;
    pub const FLASHWRITE: u32 = 0xFFFF_FF45;
    pub const FLASHREAD: u32 = 0xFFFF_FF46;
    pub const FLASHUPDATE: u32 = 0xFFFF_FF47;
    pub const FLASHDETACH: u32 = 0xFFFF_FF48;
    pub const FLASHATTACH: u32 = 0xFFFF_FF49;
    pub const FLASHFAST: u32 = 0xFFFF_FF4A;
}

/// Widget and image option bits
pub mod opt {
    pub const NONE: u16 = 0;
    pub const MONO: u16 = 1;
    pub const NODL: u16 = 2;
    pub const FLAT: u16 = 256;
    pub const SIGNED: u16 = 256;
    pub const CENTERX: u16 = 512;
    pub const CENTERY: u16 = 1024;
    pub const CENTER: u16 = CENTERX | CENTERY;
    pub const RIGHTX: u16 = 2048;
    pub const NOBACK: u16 = 4096;
    pub const NOTICKS: u16 = 8192;
    pub const NOHM: u16 = 16384;
    pub const NOPOINTER: u16 = 16384;
    pub const NOSECS: u16 = 32768;
    pub const NOHANDS: u16 = NOHM | NOSECS;
}

/// Pack two 16-bit operands into one word, `lo` first in memory
pub const fn pair(lo: u16, hi: u16) -> u32 {
    ((hi as u32) << 16) | lo as u32
}

/// Pack a signed screen coordinate pair
pub const fn xy(x: i16, y: i16) -> u32 {
    pair(x as u16, y as u16)
}

pub const fn dlstart() -> [u32; 1] {
    [op::DLSTART]
}

pub const fn swap() -> [u32; 1] {
    [op::SWAP]
}

/// Raise `INT_CMDFLAG` after `ms` milliseconds
pub const fn interrupt(ms: u32) -> [u32; 2] {
    [op::INTERRUPT, ms]
}

pub const fn bgcolor(rgb: u32) -> [u32; 2] {
    [op::BGCOLOR, rgb & 0xFF_FFFF]
}

pub const fn fgcolor(rgb: u32) -> [u32; 2] {
    [op::FGCOLOR, rgb & 0xFF_FFFF]
}

pub const fn gradcolor(rgb: u32) -> [u32; 2] {
    [op::GRADCOLOR, rgb & 0xFF_FFFF]
}

pub const fn gradient(x0: i16, y0: i16, rgb0: u32, x1: i16, y1: i16, rgb1: u32) -> [u32; 5] {
    [op::GRADIENT, xy(x0, y0), rgb0 & 0xFF_FFFF, xy(x1, y1), rgb1 & 0xFF_FFFF]
}

/// Header for `CMD_TEXT`; follow with [`pack_str`]
pub const fn text(x: i16, y: i16, font: u16, options: u16) -> [u32; 3] {
    [op::TEXT, xy(x, y), pair(font, options)]
}

/// Header for `CMD_BUTTON`; follow with [`pack_str`]
pub const fn button(x: i16, y: i16, w: u16, h: u16, font: u16, options: u16) -> [u32; 4] {
    [op::BUTTON, xy(x, y), pair(w, h), pair(font, options)]
}

/// Header for `CMD_KEYS`; follow with [`pack_str`]
pub const fn keys(x: i16, y: i16, w: u16, h: u16, font: u16, options: u16) -> [u32; 4] {
    [op::KEYS, xy(x, y), pair(w, h), pair(font, options)]
}

pub const fn progress(x: i16, y: i16, w: u16, h: u16, options: u16, value: u16, range: u16) -> [u32; 5] {
    [op::PROGRESS, xy(x, y), pair(w, h), pair(options, value), range as u32]
}

pub const fn slider(x: i16, y: i16, w: u16, h: u16, options: u16, value: u16, range: u16) -> [u32; 5] {
    [op::SLIDER, xy(x, y), pair(w, h), pair(options, value), range as u32]
}

#[allow(clippy::too_many_arguments)]
pub const fn scrollbar(
    x: i16,
    y: i16,
    w: u16,
    h: u16,
    options: u16,
    value: u16,
    size: u16,
    range: u16,
) -> [u32; 5] {
    [op::SCROLLBAR, xy(x, y), pair(w, h), pair(options, value), pair(size, range)]
}

/// Header for `CMD_TOGGLE`; follow with [`pack_str`] (labels split by `\xFF`)
pub const fn toggle(x: i16, y: i16, w: u16, font: u16, options: u16, state: u16) -> [u32; 4] {
    [op::TOGGLE, xy(x, y), pair(w, font), pair(options, state)]
}

#[allow(clippy::too_many_arguments)]
pub const fn gauge(
    x: i16,
    y: i16,
    r: u16,
    options: u16,
    major: u16,
    minor: u16,
    value: u16,
    range: u16,
) -> [u32; 5] {
    [op::GAUGE, xy(x, y), pair(r, options), pair(major, minor), pair(value, range)]
}

#[allow(clippy::too_many_arguments)]
pub const fn clock(
    x: i16,
    y: i16,
    r: u16,
    options: u16,
    h: u16,
    m: u16,
    s: u16,
    ms: u16,
) -> [u32; 5] {
    [op::CLOCK, xy(x, y), pair(r, options), pair(h, m), pair(s, ms)]
}

pub const fn dial(x: i16, y: i16, r: u16, options: u16, value: u16) -> [u32; 4] {
    [op::DIAL, xy(x, y), pair(r, options), value as u32]
}

pub const fn number(x: i16, y: i16, font: u16, options: u16, n: i32) -> [u32; 4] {
    [op::NUMBER, xy(x, y), pair(font, options), n as u32]
}

pub const fn spinner(x: i16, y: i16, style: u16, scale: u16) -> [u32; 3] {
    [op::SPINNER, xy(x, y), pair(style, scale)]
}

pub const fn stop() -> [u32; 1] {
    [op::STOP]
}

/// Set up bitmap handle state for a RAM_G bitmap
pub const fn setbitmap(address: u32, format: u16, w: u16, h: u16) -> [u32; 4] {
    [op::SETBITMAP, address, pair(format, w), h as u32]
}

/// Report the tracked value of `tag` inside the rectangle via `REG_TRACKER`
pub const fn track(x: i16, y: i16, w: u16, h: u16, tag: u8) -> [u32; 4] {
    [op::TRACK, xy(x, y), pair(w, h), tag as u32]
}

/// Header for `CMD_MEMWRITE`; follow with `num` bytes via [`pack_bytes`]
pub const fn memwrite(ptr: u32, num: u32) -> [u32; 3] {
    [op::MEMWRITE, ptr, num]
}

pub const fn memset(ptr: u32, value: u8, num: u32) -> [u32; 4] {
    [op::MEMSET, ptr, value as u32, num]
}

pub const fn memzero(ptr: u32, num: u32) -> [u32; 3] {
    [op::MEMZERO, ptr, num]
}

pub const fn memcpy(dst: u32, src: u32, num: u32) -> [u32; 4] {
    [op::MEMCPY, dst, src, num]
}

/// Execute `num` bytes of display list stored at `ptr`
pub const fn append(ptr: u32, num: u32) -> [u32; 3] {
    [op::APPEND, ptr, num]
}

pub const fn snapshot2(format: u32, ptr: u32, x: i16, y: i16, w: u16, h: u16) -> [u32; 5] {
    [op::SNAPSHOT2, format, ptr, xy(x, y), pair(w, h)]
}

pub const fn sketch(x: i16, y: i16, w: u16, h: u16, ptr: u32, format: u32) -> [u32; 5] {
    [op::SKETCH, xy(x, y), pair(w, h), ptr, format]
}

/// Header for `CMD_LOADIMAGE`; follow with the JPEG/PNG bytes
pub const fn loadimage(ptr: u32, options: u32) -> [u32; 3] {
    [op::LOADIMAGE, ptr, options]
}

/// Header for `CMD_INFLATE`; follow with the deflate stream
pub const fn inflate(ptr: u32) -> [u32; 2] {
    [op::INFLATE, ptr]
}

/// Touch calibration; the coprocessor writes its result into the second word
pub const fn calibrate() -> [u32; 2] {
    [op::CALIBRATE, 0]
}

pub const fn flashattach() -> [u32; 1] {
    [op::FLASHATTACH]
}

pub const fn flashdetach() -> [u32; 1] {
    [op::FLASHDETACH]
}

/// Enter full-speed flash mode; the result code lands in the second word
pub const fn flashfast() -> [u32; 2] {
    [op::FLASHFAST, 0]
}

pub const fn flasherase() -> [u32; 1] {
    [op::FLASHERASE]
}

pub const fn flashread(dst: u32, src: u32, num: u32) -> [u32; 4] {
    [op::FLASHREAD, dst, src, num]
}

pub const fn flashupdate(dst: u32, src: u32, num: u32) -> [u32; 4] {
    [op::FLASHUPDATE, dst, src, num]
}

/// Number of words [`pack_bytes`] produces for `len` bytes
pub const fn padded_words(len: usize) -> usize {
    len.div_ceil(4)
}

/// Inline payload as little-endian words, zero padded to a word boundary
pub fn pack_bytes(data: &[u8]) -> impl Iterator<Item = u32> + '_ {
    data.chunks(4).map(|chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    })
}

/// String operand: bytes, a NUL terminator, then zero padding
///
/// Always at least one word, even for an empty string.
pub fn pack_str(s: &str) -> impl Iterator<Item = u32> + '_ {
    let bytes = s.as_bytes();
    (0..bytes.len() / 4 + 1).map(move |i| {
        let mut word = [0u8; 4];
        for (j, b) in word.iter_mut().enumerate() {
            if let Some(&byte) = bytes.get(i * 4 + j) {
                *b = byte;
            }
        }
        u32::from_le_bytes(word)
    })
}
