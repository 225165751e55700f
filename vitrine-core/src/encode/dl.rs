//! Display list primitives
//!
//! Each function returns one display list word. Operands are masked to
//! their field width, so out-of-range values wrap instead of corrupting
//! the opcode bits.

/// Graphics primitives for [`begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Primitive {
    Bitmaps = 1,
    Points = 2,
    Lines = 3,
    LineStrip = 4,
    EdgeStripR = 5,
    EdgeStripL = 6,
    EdgeStripA = 7,
    EdgeStripB = 8,
    Rects = 9,
}

/// Bitmap sampling filter for [`bitmap_size`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Filter {
    Nearest,
    Bilinear,
}

/// Bitmap wrap mode for [`bitmap_size`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wrap {
    Border,
    Repeat,
}

const fn op(code: u32) -> u32 {
    code << 24
}

/// End of display list
pub const fn display() -> u32 {
    0
}

pub const fn bitmap_source(address: u32) -> u32 {
    op(0x01) | (address & 0x3F_FFFF)
}

pub const fn clear_color_rgb(rgb: u32) -> u32 {
    op(0x02) | (rgb & 0xFF_FFFF)
}

/// Tag value written to the tag buffer for subsequent primitives
pub const fn tag(value: u8) -> u32 {
    op(0x03) | value as u32
}

pub const fn color_rgb(rgb: u32) -> u32 {
    op(0x04) | (rgb & 0xFF_FFFF)
}

pub const fn bitmap_handle(handle: u8) -> u32 {
    op(0x05) | (handle as u32 & 0x1F)
}

pub const fn cell(cell: u8) -> u32 {
    op(0x06) | (cell as u32 & 0x7F)
}

pub const fn bitmap_layout(format: u32, stride: u32, height: u32) -> u32 {
    op(0x07) | ((format & 0x1F) << 19) | ((stride & 0x3FF) << 9) | (height & 0x1FF)
}

pub const fn bitmap_size(filter: Filter, wrap_x: Wrap, wrap_y: Wrap, width: u32, height: u32) -> u32 {
    let f = match filter {
        Filter::Nearest => 0,
        Filter::Bilinear => 1,
    };
    let wx = match wrap_x {
        Wrap::Border => 0,
        Wrap::Repeat => 1,
    };
    let wy = match wrap_y {
        Wrap::Border => 0,
        Wrap::Repeat => 1,
    };
    op(0x08) | (f << 20) | (wx << 19) | (wy << 18) | ((width & 0x1FF) << 9) | (height & 0x1FF)
}

pub const fn point_size(size: u16) -> u32 {
    op(0x0D) | (size as u32 & 0x1FFF)
}

pub const fn line_width(width: u16) -> u32 {
    op(0x0E) | (width as u32 & 0xFFF)
}

pub const fn clear_color_a(alpha: u8) -> u32 {
    op(0x0F) | alpha as u32
}

pub const fn color_a(alpha: u8) -> u32 {
    op(0x10) | alpha as u32
}

pub const fn clear_tag(value: u8) -> u32 {
    op(0x12) | value as u32
}

pub const fn tag_mask(enabled: bool) -> u32 {
    op(0x14) | enabled as u32
}

pub const fn scissor_xy(x: u16, y: u16) -> u32 {
    op(0x1B) | ((x as u32 & 0x7FF) << 11) | (y as u32 & 0x7FF)
}

pub const fn scissor_size(width: u16, height: u16) -> u32 {
    op(0x1C) | ((width as u32 & 0xFFF) << 12) | (height as u32 & 0xFFF)
}

pub const fn begin(primitive: Primitive) -> u32 {
    op(0x1F) | primitive as u32
}

pub const fn end() -> u32 {
    op(0x21)
}

pub const fn save_context() -> u32 {
    op(0x22)
}

pub const fn restore_context() -> u32 {
    op(0x23)
}

/// Clear the selected buffers
pub const fn clear(color: bool, stencil: bool, tag: bool) -> u32 {
    op(0x26) | ((color as u32) << 2) | ((stencil as u32) << 1) | tag as u32
}

/// Fractional bits used by [`vertex2f`] coordinates (0..=4)
pub const fn vertex_format(frac: u8) -> u32 {
    op(0x27) | (frac as u32 & 0x7)
}

pub const fn bitmap_layout_h(stride: u32, height: u32) -> u32 {
    op(0x28) | (((stride >> 10) & 0x3) << 2) | ((height >> 9) & 0x3)
}

pub const fn bitmap_size_h(width: u32, height: u32) -> u32 {
    op(0x29) | (((width >> 9) & 0x3) << 2) | ((height >> 9) & 0x3)
}

/// Vertex with two signed 15-bit coordinates, in units set by [`vertex_format`]
pub const fn vertex2f(x: i16, y: i16) -> u32 {
    (0b01 << 30) | (((x as u32) & 0x7FFF) << 15) | ((y as u32) & 0x7FFF)
}

/// Vertex in whole pixels with bitmap handle and cell (0..511 range)
pub const fn vertex2ii(x: u16, y: u16, handle: u8, cell: u8) -> u32 {
    (0b10 << 30)
        | ((x as u32 & 0x1FF) << 21)
        | ((y as u32 & 0x1FF) << 12)
        | ((handle as u32 & 0x1F) << 7)
        | (cell as u32 & 0x7F)
}
