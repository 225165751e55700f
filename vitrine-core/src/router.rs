//! Interrupt router
//!
//! Decodes `REG_INT_FLAGS` and hands each event to whoever subscribed:
//!
//! | flag           | source register         | subscribers                 |
//! |----------------|-------------------------|-----------------------------|
//! | `SWAP`         | -                       | one swap handler            |
//! | `TOUCH`        | `REG_TOUCH_SCREEN_XY`   | one touch handler           |
//! | `TAG`          | `REG_TOUCH_TAG`         | press handlers of that tag  |
//! | `CONVCOMPLETE` | `REG_TRACKER`           | conversion handler, then track handlers of the reported tag |
//!
//! Handlers get the command buffer so they can queue drawing in response.
//! Interrupt sources are unmasked on first subscription.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::buffer::{BufferError, CommandBuffer};
use crate::bus::Bus;
use crate::encode::cmd;
use crate::regs::{int, REG_INT_EN, REG_INT_FLAGS, REG_INT_MASK, REG_TOUCH_SCREEN_XY, REG_TOUCH_TAG, REG_TRACKER};

/// Usable tags are 1..=254; 0 means "no tag" and 255 is the default tag
pub const MAX_TAGS: usize = 254;

pub type Handler<B> = Box<dyn FnMut(&mut CommandBuffer<B>)>;
pub type TouchHandler<B> = Box<dyn FnMut(&mut CommandBuffer<B>, i16, i16)>;
pub type PressHandler<B> = Box<dyn FnMut(&mut CommandBuffer<B>, u8)>;
pub type TrackHandler<B> = Box<dyn FnMut(&mut CommandBuffer<B>, u8, u16)>;

/// Errors from subscription and dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouterError {
    Buffer(BufferError),
    /// Tag 0 or 255 requested
    InvalidTag,
    /// Every tag in 1..=254 is taken
    PoolExhausted,
}

impl From<BufferError> for RouterError {
    fn from(e: BufferError) -> Self {
        RouterError::Buffer(e)
    }
}

struct TagEntry<B: Bus> {
    press: Vec<PressHandler<B>>,
    track: Vec<TrackHandler<B>>,
}

impl<B: Bus> TagEntry<B> {
    fn new() -> Self {
        Self {
            press: Vec::new(),
            track: Vec::new(),
        }
    }
}

/// Subscriber table for chip interrupts
pub struct Router<B: Bus> {
    tags: BTreeMap<u8, TagEntry<B>>,
    on_swap: Option<Handler<B>>,
    on_touch: Option<TouchHandler<B>>,
    on_conversion: Option<Handler<B>>,
    /// Bits already written to `REG_INT_MASK`
    mask: u8,
}

impl<B: Bus> Default for Router<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bus> Router<B> {
    pub fn new() -> Self {
        Self {
            tags: BTreeMap::new(),
            on_swap: None,
            on_touch: None,
            on_conversion: None,
            mask: 0,
        }
    }

    /// Interrupt sources currently unmasked
    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Call `handler` whenever `tag` is pressed
    ///
    /// With `tag == None` the first free tag is allocated. Returns the tag
    /// to paint with [`CanvasExt::tag`](crate::canvas::CanvasExt::tag).
    pub fn attach<F>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        tag: Option<u8>,
        handler: F,
    ) -> Result<u8, RouterError>
    where
        F: FnMut(&mut CommandBuffer<B>, u8) + 'static,
    {
        let tag = self.claim(tag)?;
        self.enable(buffer, int::TAG)?;
        self.tags
            .entry(tag)
            .or_insert_with(TagEntry::new)
            .press
            .push(Box::new(handler));
        trace!("router: press handler on tag {}", tag);
        Ok(tag)
    }

    /// Track `tag` inside a rectangle and report its value on every
    /// conversion
    ///
    /// Queues `CMD_TRACK`; it takes effect with the next flush.
    #[allow(clippy::too_many_arguments)]
    pub fn set_tracking<F>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        x: i16,
        y: i16,
        w: u16,
        h: u16,
        tag: Option<u8>,
        handler: F,
    ) -> Result<u8, RouterError>
    where
        F: FnMut(&mut CommandBuffer<B>, u8, u16) + 'static,
    {
        let tag = self.claim(tag)?;
        buffer.push_all(&cmd::track(x, y, w, h, tag))?;
        self.enable(buffer, int::CONVCOMPLETE)?;
        self.tags
            .entry(tag)
            .or_insert_with(TagEntry::new)
            .track
            .push(Box::new(handler));
        trace!("router: tracking tag {}", tag);
        Ok(tag)
    }

    /// Drop every handler of `tag`
    pub fn detach(&mut self, tag: u8) -> bool {
        self.tags.remove(&tag).is_some()
    }

    pub fn on_swap<F>(&mut self, buffer: &mut CommandBuffer<B>, handler: F) -> Result<(), RouterError>
    where
        F: FnMut(&mut CommandBuffer<B>) + 'static,
    {
        self.enable(buffer, int::SWAP)?;
        self.on_swap = Some(Box::new(handler));
        Ok(())
    }

    pub fn on_touch<F>(&mut self, buffer: &mut CommandBuffer<B>, handler: F) -> Result<(), RouterError>
    where
        F: FnMut(&mut CommandBuffer<B>, i16, i16) + 'static,
    {
        self.enable(buffer, int::TOUCH)?;
        self.on_touch = Some(Box::new(handler));
        Ok(())
    }

    pub fn on_conversion<F>(&mut self, buffer: &mut CommandBuffer<B>, handler: F) -> Result<(), RouterError>
    where
        F: FnMut(&mut CommandBuffer<B>) + 'static,
    {
        self.enable(buffer, int::CONVCOMPLETE)?;
        self.on_conversion = Some(Box::new(handler));
        Ok(())
    }

    /// Read the interrupt flags once and run the matching handlers
    ///
    /// Returns the flags that were handled.
    pub fn dispatch(&mut self, buffer: &mut CommandBuffer<B>) -> Result<u8, RouterError> {
        let flags = buffer.bus_mut().rd8(REG_INT_FLAGS).map_err(BufferError::from)? & self.mask;

        if flags & int::SWAP != 0 {
            if let Some(handler) = self.on_swap.as_mut() {
                handler(buffer);
            }
        }

        if flags & int::TOUCH != 0 {
            let xy = buffer
                .bus_mut()
                .rd32(REG_TOUCH_SCREEN_XY)
                .map_err(BufferError::from)?;
            if let Some(handler) = self.on_touch.as_mut() {
                handler(buffer, (xy >> 16) as i16, xy as i16);
            }
        }

        if flags & int::TAG != 0 {
            let tag = buffer
                .bus_mut()
                .rd8(REG_TOUCH_TAG)
                .map_err(BufferError::from)?;
            if let Some(entry) = self.tags.get_mut(&tag) {
                for handler in entry.press.iter_mut() {
                    handler(buffer, tag);
                }
            }
        }

        if flags & int::CONVCOMPLETE != 0 {
            if let Some(handler) = self.on_conversion.as_mut() {
                handler(buffer);
            }
            let tracker = buffer
                .bus_mut()
                .rd32(REG_TRACKER)
                .map_err(BufferError::from)?;
            let tag = tracker as u8;
            let value = (tracker >> 16) as u16;
            if let Some(entry) = self.tags.get_mut(&tag) {
                for handler in entry.track.iter_mut() {
                    handler(buffer, tag, value);
                }
            }
        }

        Ok(flags)
    }

    /// Validate a requested tag or allocate the lowest free one
    fn claim(&self, tag: Option<u8>) -> Result<u8, RouterError> {
        match tag {
            Some(0) | Some(u8::MAX) => Err(RouterError::InvalidTag),
            Some(tag) => Ok(tag),
            None => {
                let mut candidate: usize = 1;
                for &taken in self.tags.keys() {
                    if taken as usize == candidate {
                        candidate += 1;
                    } else if taken as usize > candidate {
                        break;
                    }
                }
                if candidate > MAX_TAGS {
                    warn!("router: all {} tags in use", MAX_TAGS);
                    return Err(RouterError::PoolExhausted);
                }
                Ok(candidate as u8)
            }
        }
    }

    fn enable(&mut self, buffer: &mut CommandBuffer<B>, bits: u8) -> Result<(), BufferError> {
        if self.mask & bits == bits {
            return Ok(());
        }
        self.mask |= bits;
        let bus = buffer.bus_mut();
        bus.wr8(REG_INT_MASK, self.mask)?;
        bus.wr8(REG_INT_EN, 1)?;
        debug!("router: interrupt mask {:#x}", self.mask);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec as StdVec;

    use super::*;
    use crate::config::EngineConfig;
    use crate::mock::FakeEve;

    type Log = Rc<RefCell<StdVec<&'static str>>>;

    fn setup() -> (Router<FakeEve>, CommandBuffer<FakeEve>) {
        (
            Router::new(),
            CommandBuffer::new(FakeEve::new(), EngineConfig::default()),
        )
    }

    fn recorder(log: &Log, label: &'static str) -> impl FnMut(&mut CommandBuffer<FakeEve>, u8) + 'static {
        let log = log.clone();
        move |_: &mut CommandBuffer<FakeEve>, _: u8| log.borrow_mut().push(label)
    }

    #[test]
    fn test_tag_dispatch_hits_only_matching_tag() {
        let (mut router, mut buf) = setup();
        let log: Log = Rc::default();
        router.attach(&mut buf, Some(3), recorder(&log, "three")).unwrap();
        router.attach(&mut buf, Some(7), recorder(&log, "seven-a")).unwrap();
        router.attach(&mut buf, Some(7), recorder(&log, "seven-b")).unwrap();

        buf.bus_mut().poke8(REG_TOUCH_TAG, 7);
        buf.bus_mut().raise(int::TAG);
        assert_eq!(router.dispatch(&mut buf), Ok(int::TAG));
        assert_eq!(*log.borrow(), ["seven-a", "seven-b"]);

        // flags were consumed by the read
        assert_eq!(router.dispatch(&mut buf), Ok(0));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_tag_allocation_fills_gaps() {
        let (mut router, mut buf) = setup();
        assert_eq!(router.attach(&mut buf, None, |_, _| {}), Ok(1));
        assert_eq!(router.attach(&mut buf, Some(2), |_, _| {}), Ok(2));
        assert_eq!(router.attach(&mut buf, None, |_, _| {}), Ok(3));
        assert!(router.detach(1));
        assert_eq!(router.attach(&mut buf, None, |_, _| {}), Ok(1));
        assert!(!router.detach(9));
    }

    #[test]
    fn test_reserved_tags_and_exhaustion() {
        let (mut router, mut buf) = setup();
        assert_eq!(router.attach(&mut buf, Some(0), |_, _| {}), Err(RouterError::InvalidTag));
        assert_eq!(router.attach(&mut buf, Some(255), |_, _| {}), Err(RouterError::InvalidTag));

        for expected in 1..=254u8 {
            assert_eq!(router.attach(&mut buf, None, |_, _| {}), Ok(expected));
        }
        assert_eq!(router.tag_count(), MAX_TAGS);
        assert_eq!(
            router.attach(&mut buf, None, |_, _| {}),
            Err(RouterError::PoolExhausted)
        );
    }

    #[test]
    fn test_mask_enabled_once() {
        let (mut router, mut buf) = setup();
        router.attach(&mut buf, None, |_, _| {}).unwrap();
        router.attach(&mut buf, None, |_, _| {}).unwrap();
        router.on_swap(&mut buf, |_| {}).unwrap();

        let mask_writes: StdVec<u32> = buf
            .bus()
            .writes
            .iter()
            .filter(|(a, _)| *a == REG_INT_MASK)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(mask_writes, [0x04, 0x05]);
        assert_eq!(buf.bus().peek8(REG_INT_EN), 1);
        assert_eq!(router.mask(), int::TAG | int::SWAP);
    }

    #[test]
    fn test_tracking_reports_value() {
        let (mut router, mut buf) = setup();
        let seen = Rc::new(RefCell::new(StdVec::new()));
        let conversions = Rc::new(RefCell::new(0));

        let s = seen.clone();
        let tag = router
            .set_tracking(&mut buf, 10, 10, 200, 20, None, move |_, tag, value| {
                s.borrow_mut().push((tag, value))
            })
            .unwrap();
        let c = conversions.clone();
        router.on_conversion(&mut buf, move |_| *c.borrow_mut() += 1).unwrap();
        assert_eq!(buf.pending(), cmd::track(10, 10, 200, 20, tag));

        buf.bus_mut().poke32(REG_TRACKER, (30_000 << 16) | tag as u32);
        buf.bus_mut().raise(int::CONVCOMPLETE);
        router.dispatch(&mut buf).unwrap();
        assert_eq!(*seen.borrow(), [(tag, 30_000)]);
        assert_eq!(*conversions.borrow(), 1);
    }

    #[test]
    fn test_touch_and_swap_slots() {
        let (mut router, mut buf) = setup();
        let touches = Rc::new(RefCell::new(StdVec::new()));
        let swaps = Rc::new(RefCell::new(0));

        let t = touches.clone();
        router
            .on_touch(&mut buf, move |_, x, y| t.borrow_mut().push((x, y)))
            .unwrap();
        let s = swaps.clone();
        router.on_swap(&mut buf, move |_| *s.borrow_mut() += 1).unwrap();

        buf.bus_mut().poke32(REG_TOUCH_SCREEN_XY, (120 << 16) | 45);
        buf.bus_mut().raise(int::TOUCH | int::SWAP);
        assert_eq!(router.dispatch(&mut buf), Ok(int::TOUCH | int::SWAP));
        assert_eq!(*touches.borrow(), [(120, 45)]);
        assert_eq!(*swaps.borrow(), 1);
    }

    #[test]
    fn test_handler_can_queue_commands() {
        let (mut router, mut buf) = setup();
        router
            .attach(&mut buf, Some(5), |buf, _| {
                let _ = buf.push_all(&cmd::swap());
            })
            .unwrap();
        buf.bus_mut().poke8(REG_TOUCH_TAG, 5);
        buf.bus_mut().raise(int::TAG);
        router.dispatch(&mut buf).unwrap();
        assert_eq!(buf.pending(), cmd::swap());
    }

    #[test]
    fn test_unsubscribed_flags_ignored() {
        let (mut router, mut buf) = setup();
        buf.bus_mut().raise(int::TAG | int::SOUND);
        assert_eq!(router.dispatch(&mut buf), Ok(0));
    }
}
