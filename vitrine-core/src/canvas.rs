//! Drawing surface
//!
//! [`Canvas`] is what widget code draws on: it only needs to queue words.
//! [`CanvasExt`] layers the typed drawing calls on top and is implemented
//! for every canvas.
//!
//! Coordinates are whole pixels; [`CanvasExt::start_frame`] selects
//! `VERTEX_FORMAT(0)` so `VERTEX2F` takes pixel units.

use heapless::Vec;

use crate::buffer::{BufferError, CommandBuffer};
use crate::bus::Bus;
use crate::encode::cmd::{self, pack_bytes, pack_str};
use crate::encode::dl::{self, Primitive};

/// Longest command (header plus string) a widget call assembles
pub const MAX_COMMAND_WORDS: usize = 72;

/// A sink for command words
pub trait Canvas {
    /// Queue one word
    fn push(&mut self, word: u32) -> Result<(), BufferError>;

    /// Queue a command whose words must reach the coprocessor together
    fn push_all(&mut self, words: &[u32]) -> Result<(), BufferError>;
}

impl<B: Bus> Canvas for CommandBuffer<B> {
    fn push(&mut self, word: u32) -> Result<(), BufferError> {
        CommandBuffer::push(self, word)
    }

    fn push_all(&mut self, words: &[u32]) -> Result<(), BufferError> {
        CommandBuffer::push_all(self, words)
    }
}

fn with_str(header: &[u32], s: &str) -> Result<Vec<u32, MAX_COMMAND_WORDS>, BufferError> {
    let mut words = Vec::new();
    words
        .extend_from_slice(header)
        .map_err(|_| BufferError::StringTooLong)?;
    for word in pack_str(s) {
        words.push(word).map_err(|_| BufferError::StringTooLong)?;
    }
    Ok(words)
}

/// Typed drawing calls
pub trait CanvasExt: Canvas {
    /// Begin a display list cleared to `rgb`
    fn start_frame(&mut self, rgb: u32) -> Result<(), BufferError> {
        self.push_all(&cmd::dlstart())?;
        self.push(dl::vertex_format(0))?;
        self.push(dl::clear_color_rgb(rgb))?;
        self.push(dl::clear(true, true, true))
    }

    /// End the display list and swap it in on the next frame
    fn finish_frame(&mut self) -> Result<(), BufferError> {
        self.push(dl::display())?;
        self.push_all(&cmd::swap())
    }

    fn color(&mut self, rgb: u32) -> Result<(), BufferError> {
        self.push(dl::color_rgb(rgb))
    }

    fn alpha(&mut self, alpha: u8) -> Result<(), BufferError> {
        self.push(dl::color_a(alpha))
    }

    /// Tag subsequent primitives for touch reporting
    fn tag(&mut self, tag: u8) -> Result<(), BufferError> {
        self.push(dl::tag(tag))
    }

    fn bgcolor(&mut self, rgb: u32) -> Result<(), BufferError> {
        self.push_all(&cmd::bgcolor(rgb))
    }

    fn fgcolor(&mut self, rgb: u32) -> Result<(), BufferError> {
        self.push_all(&cmd::fgcolor(rgb))
    }

    /// Filled circle of `radius` pixels
    fn point(&mut self, x: i16, y: i16, radius: u16) -> Result<(), BufferError> {
        self.push(dl::point_size(radius.saturating_mul(16)))?;
        self.push(dl::begin(Primitive::Points))?;
        self.push(dl::vertex2f(x, y))?;
        self.push(dl::end())
    }

    fn line(&mut self, x0: i16, y0: i16, x1: i16, y1: i16, width: u16) -> Result<(), BufferError> {
        self.push(dl::line_width(width.saturating_mul(8)))?;
        self.push(dl::begin(Primitive::Lines))?;
        self.push(dl::vertex2f(x0, y0))?;
        self.push(dl::vertex2f(x1, y1))?;
        self.push(dl::end())
    }

    /// Filled rectangle; `radius` rounds the corners
    fn rectangle(&mut self, x: i16, y: i16, w: i16, h: i16, radius: u16) -> Result<(), BufferError> {
        self.push(dl::line_width(radius.max(1).saturating_mul(16)))?;
        self.push(dl::begin(Primitive::Rects))?;
        self.push(dl::vertex2f(x, y))?;
        self.push(dl::vertex2f(x.saturating_add(w), y.saturating_add(h)))?;
        self.push(dl::end())
    }

    /// Bitmap cell at a pixel position (0..511)
    fn bitmap(&mut self, x: u16, y: u16, handle: u8, cell: u8) -> Result<(), BufferError> {
        self.push(dl::begin(Primitive::Bitmaps))?;
        self.push(dl::vertex2ii(x, y, handle, cell))?;
        self.push(dl::end())
    }

    fn gradient(&mut self, x0: i16, y0: i16, rgb0: u32, x1: i16, y1: i16, rgb1: u32) -> Result<(), BufferError> {
        self.push_all(&cmd::gradient(x0, y0, rgb0, x1, y1, rgb1))
    }

    fn text(&mut self, x: i16, y: i16, font: u16, options: u16, s: &str) -> Result<(), BufferError> {
        let words = with_str(&cmd::text(x, y, font, options), s)?;
        self.push_all(&words)
    }

    #[allow(clippy::too_many_arguments)]
    fn button(&mut self, x: i16, y: i16, w: u16, h: u16, font: u16, options: u16, label: &str) -> Result<(), BufferError> {
        let words = with_str(&cmd::button(x, y, w, h, font, options), label)?;
        self.push_all(&words)
    }

    #[allow(clippy::too_many_arguments)]
    fn keys(&mut self, x: i16, y: i16, w: u16, h: u16, font: u16, options: u16, keys: &str) -> Result<(), BufferError> {
        let words = with_str(&cmd::keys(x, y, w, h, font, options), keys)?;
        self.push_all(&words)
    }

    /// Toggle with `off` and `on` labels
    #[allow(clippy::too_many_arguments)]
    fn toggle(&mut self, x: i16, y: i16, w: u16, font: u16, options: u16, on: bool, off_label: &str, on_label: &str) -> Result<(), BufferError> {
        let state = if on { u16::MAX } else { 0 };
        let mut words = with_str(&cmd::toggle(x, y, w, font, options, state), off_label)?;
        // replace the terminator with the 0xFF label separator
        words.truncate(words.len() - 1);
        let tail_start = off_label.len() / 4 * 4;
        let mut joined: Vec<u8, 256> = Vec::new();
        joined
            .extend_from_slice(&off_label.as_bytes()[tail_start..])
            .map_err(|_| BufferError::StringTooLong)?;
        joined.push(0xFF).map_err(|_| BufferError::StringTooLong)?;
        joined
            .extend_from_slice(on_label.as_bytes())
            .map_err(|_| BufferError::StringTooLong)?;
        joined.push(0).map_err(|_| BufferError::StringTooLong)?;
        for word in pack_bytes(&joined) {
            words.push(word).map_err(|_| BufferError::StringTooLong)?;
        }
        self.push_all(&words)
    }

    #[allow(clippy::too_many_arguments)]
    fn gauge(&mut self, x: i16, y: i16, r: u16, options: u16, major: u16, minor: u16, value: u16, range: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::gauge(x, y, r, options, major, minor, value, range))
    }

    #[allow(clippy::too_many_arguments)]
    fn slider(&mut self, x: i16, y: i16, w: u16, h: u16, options: u16, value: u16, range: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::slider(x, y, w, h, options, value, range))
    }

    #[allow(clippy::too_many_arguments)]
    fn progress(&mut self, x: i16, y: i16, w: u16, h: u16, options: u16, value: u16, range: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::progress(x, y, w, h, options, value, range))
    }

    #[allow(clippy::too_many_arguments)]
    fn scrollbar(&mut self, x: i16, y: i16, w: u16, h: u16, options: u16, value: u16, size: u16, range: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::scrollbar(x, y, w, h, options, value, size, range))
    }

    fn dial(&mut self, x: i16, y: i16, r: u16, options: u16, value: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::dial(x, y, r, options, value))
    }

    #[allow(clippy::too_many_arguments)]
    fn clock(&mut self, x: i16, y: i16, r: u16, options: u16, h: u16, m: u16, s: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::clock(x, y, r, options, h, m, s, 0))
    }

    fn number(&mut self, x: i16, y: i16, font: u16, options: u16, n: i32) -> Result<(), BufferError> {
        self.push_all(&cmd::number(x, y, font, options, n))
    }

    fn spinner(&mut self, x: i16, y: i16, style: u16, scale: u16) -> Result<(), BufferError> {
        self.push_all(&cmd::spinner(x, y, style, scale))
    }

    /// Stop a running spinner or screensaver
    fn stop(&mut self) -> Result<(), BufferError> {
        self.push_all(&cmd::stop())
    }

    /// Command header followed by an inline byte payload
    ///
    /// The header goes out in one batch; the payload may be split across
    /// batches since the coprocessor consumes it as a stream.
    fn stream(&mut self, header: &[u32], data: &[u8]) -> Result<(), BufferError> {
        self.push_all(header)?;
        for word in pack_bytes(data) {
            self.push(word)?;
        }
        Ok(())
    }
}

impl<T: Canvas> CanvasExt for T {}
