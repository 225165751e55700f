//! Engine façade and event loop
//!
//! [`Engine`] owns every piece of chip-side state and runs the cooperative
//! loop: interrupts posted from the host side and expired timers become
//! [`Event`]s, handled one at a time in arrival order. Nothing preempts a
//! handler; the firmware task calls [`Engine::run`] whenever the interrupt
//! line fires or [`Engine::next_deadline`] passes.

use heapless::Deque;

use crate::animation::{AnimationError, AnimationHandle, Animator, Easing, Step, Target};
use crate::buffer::{BufferError, CommandBuffer};
use crate::bus::Bus;
use crate::config::EngineConfig;
use crate::ramg::{AllocError, RamG};
use crate::regs::REG_PWM_DUTY;
use crate::router::{Router, RouterError};
use crate::timer::{TimerError, Timers};

/// Events waiting to be handled
pub const MAX_EVENTS: usize = 16;

/// Highest `REG_PWM_DUTY` value; full brightness
pub const BACKLIGHT_MAX: i32 = 128;

/// Something the loop has to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The chip pulled its interrupt line
    Interrupt,
    /// An animation is due for its next step
    Animation(AnimationHandle),
}

/// Errors surfaced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    Buffer(BufferError),
    Alloc(AllocError),
    Router(RouterError),
    Animation(AnimationError),
    Timer(TimerError),
    /// Event queue full
    QueueFull,
}

impl From<BufferError> for EngineError {
    fn from(e: BufferError) -> Self {
        EngineError::Buffer(e)
    }
}

impl From<AllocError> for EngineError {
    fn from(e: AllocError) -> Self {
        EngineError::Alloc(e)
    }
}

impl From<RouterError> for EngineError {
    fn from(e: RouterError) -> Self {
        EngineError::Router(e)
    }
}

impl From<AnimationError> for EngineError {
    fn from(e: AnimationError) -> Self {
        EngineError::Animation(e)
    }
}

impl From<TimerError> for EngineError {
    fn from(e: TimerError) -> Self {
        EngineError::Timer(e)
    }
}

/// Command buffer, RamG allocator, interrupt router, timers and animations
/// for one chip
pub struct Engine<B: Bus> {
    buffer: CommandBuffer<B>,
    ramg: RamG,
    router: Router<B>,
    timers: Timers<Event>,
    animator: Animator,
    queue: Deque<Event, MAX_EVENTS>,
}

impl<B: Bus> Engine<B> {
    /// Take ownership of a bus to a chip that is already out of reset
    pub fn new(bus: B, config: EngineConfig) -> Self {
        Self {
            ramg: RamG::new(&config),
            buffer: CommandBuffer::new(bus, config),
            router: Router::new(),
            timers: Timers::new(),
            animator: Animator::new(),
            queue: Deque::new(),
        }
    }

    /// Record that the interrupt line fired
    ///
    /// A second interrupt before the first is handled is folded into it,
    /// since one flag read sees both. Returns false in that case.
    pub fn post_interrupt(&mut self) -> Result<bool, EngineError> {
        if self.queue.iter().any(|e| *e == Event::Interrupt) {
            return Ok(false);
        }
        self.queue
            .push_back(Event::Interrupt)
            .map_err(|_| EngineError::QueueFull)?;
        Ok(true)
    }

    /// Handle every event due at `now_ms`, returning how many ran
    ///
    /// On error the failing event is dropped and the rest stay queued for
    /// the next call.
    pub fn run(&mut self, now_ms: u64) -> Result<usize, EngineError> {
        let mut handled = 0;
        loop {
            while !self.queue.is_full() {
                match self.timers.next_expired(now_ms) {
                    Some((_, event)) => {
                        // full checked above
                        let _ = self.queue.push_back(event);
                    }
                    None => break,
                }
            }
            let Some(event) = self.queue.pop_front() else {
                return Ok(handled);
            };
            self.handle(event)?;
            handled += 1;
        }
    }

    fn handle(&mut self, event: Event) -> Result<(), EngineError> {
        match event {
            Event::Interrupt => {
                let flags = self.router.dispatch(&mut self.buffer)?;
                trace!("engine: interrupt flags {:#x}", flags);
            }
            Event::Animation(handle) => {
                let timer = self.animator.timer(handle);
                let step = self.animator.step(handle, &mut self.buffer);
                if let Ok(Step::Finished) | Err(_) = step {
                    self.animator.cancel(handle);
                    if let Some(timer) = timer {
                        self.timers.cancel(timer);
                    }
                    self.drop_queued(handle);
                }
                step?;
            }
        }
        Ok(())
    }

    /// When [`run`](Self::run) next has timer work, in milliseconds
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Start an animation whose first step lands one period after `now_ms`
    #[allow(clippy::too_many_arguments)]
    pub fn animate(
        &mut self,
        now_ms: u64,
        target: Target,
        from: i32,
        to: i32,
        duration_ms: u32,
        period_ms: u32,
        easing: Easing,
    ) -> Result<AnimationHandle, EngineError> {
        let handle = self
            .animator
            .start(target, from, to, duration_ms, period_ms, easing)?;
        match self
            .timers
            .schedule_repeating(now_ms, period_ms, Event::Animation(handle))
        {
            Ok(timer) => {
                self.animator.set_timer(handle, timer);
                debug!("engine: animating {} -> {} over {} ms", from, to, duration_ms);
                Ok(handle)
            }
            Err(e) => {
                self.animator.cancel(handle);
                Err(e.into())
            }
        }
    }

    /// Fade the backlight from `from` to `to` (0..=128)
    ///
    /// Only one fade runs at a time; starting a new one cancels the fade in
    /// flight, leaving the backlight wherever it had got to.
    pub fn backlight_fade(
        &mut self,
        now_ms: u64,
        from: i32,
        to: i32,
        duration_ms: u32,
        period_ms: u32,
    ) -> Result<AnimationHandle, EngineError> {
        if let Some(old) = self.animator.backlight() {
            debug!("engine: backlight fade superseded");
            self.cancel_animation(old);
        }
        let handle = self.animate(
            now_ms,
            Target::Register(REG_PWM_DUTY),
            from.clamp(0, BACKLIGHT_MAX),
            to.clamp(0, BACKLIGHT_MAX),
            duration_ms,
            period_ms,
            Easing::Linear,
        )?;
        self.animator.set_backlight(handle);
        Ok(handle)
    }

    /// Stop an animation at its current value
    pub fn cancel_animation(&mut self, handle: AnimationHandle) -> bool {
        if !self.animator.is_running(handle) {
            return false;
        }
        if let Some(timer) = self.animator.cancel(handle) {
            self.timers.cancel(timer);
        }
        self.drop_queued(handle);
        true
    }

    fn drop_queued(&mut self, handle: AnimationHandle) {
        for _ in 0..self.queue.len() {
            if let Some(event) = self.queue.pop_front() {
                if event != Event::Animation(handle) {
                    let _ = self.queue.push_back(event);
                }
            }
        }
    }

    pub fn is_animating(&self, handle: AnimationHandle) -> bool {
        self.animator.is_running(handle)
    }

    pub fn buffer(&self) -> &CommandBuffer<B> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CommandBuffer<B> {
        &mut self.buffer
    }

    pub fn ramg(&self) -> &RamG {
        &self.ramg
    }

    pub fn router(&self) -> &Router<B> {
        &self.router
    }

    /// Borrow the buffer next to the allocator and router, which both
    /// need it for every operation
    pub fn parts(&mut self) -> (&mut CommandBuffer<B>, &mut RamG, &mut Router<B>) {
        (&mut self.buffer, &mut self.ramg, &mut self.router)
    }

    /// Give the bus back
    pub fn release(self) -> B {
        self.buffer.release()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use std::boxed::Box;
    use std::rc::Rc;
    use std::vec::Vec;

    use super::*;
    use crate::canvas::CanvasExt;
    use crate::mock::FakeEve;
    use crate::regs::{int, REG_TOUCH_TAG};

    fn engine() -> Engine<FakeEve> {
        Engine::new(FakeEve::new(), EngineConfig::default())
    }

    #[test]
    fn test_interrupts_fold() {
        let mut engine = engine();
        assert_eq!(engine.post_interrupt(), Ok(true));
        assert_eq!(engine.post_interrupt(), Ok(false));
        assert_eq!(engine.run(0), Ok(1));
        assert_eq!(engine.run(0), Ok(0));
    }

    #[test]
    fn test_interrupt_reaches_tag_handler() {
        let mut engine = engine();
        let presses = Rc::new(RefCell::new(Vec::new()));
        let p = presses.clone();
        let (buffer, _, router) = engine.parts();
        let tag = router
            .attach(buffer, None, move |_: &mut CommandBuffer<FakeEve>, tag: u8| {
                p.borrow_mut().push(tag)
            })
            .unwrap();
        buffer.start_frame(0).unwrap();
        buffer.tag(tag).unwrap();
        buffer.button(10, 10, 80, 30, 27, 0, "Go").unwrap();
        buffer.finish_frame().unwrap();
        buffer.flush().unwrap();

        engine.buffer_mut().bus_mut().poke8(REG_TOUCH_TAG, tag);
        engine.buffer_mut().bus_mut().raise(int::TAG);
        engine.post_interrupt().unwrap();
        engine.run(0).unwrap();
        assert_eq!(*presses.borrow(), [tag]);
    }

    #[test]
    fn test_animation_runs_to_completion() {
        let mut engine = engine();
        let values = Rc::new(RefCell::new(Vec::new()));
        let v = values.clone();
        let handle = engine
            .animate(
                1000,
                Target::Host(Box::new(move |x| v.borrow_mut().push(x))),
                0,
                30,
                30,
                10,
                Easing::Linear,
            )
            .unwrap();
        assert_eq!(engine.next_deadline(), Some(1010));
        assert_eq!(engine.run(1005), Ok(0));

        assert_eq!(engine.run(1010), Ok(1));
        assert_eq!(engine.run(1020), Ok(1));
        assert_eq!(engine.run(1030), Ok(1));
        assert_eq!(*values.borrow(), [10, 20, 30]);
        assert!(!engine.is_animating(handle));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_single_period_animation_ticks_once() {
        let mut engine = engine();
        let values = Rc::new(RefCell::new(Vec::new()));
        let v = values.clone();
        engine
            .animate(
                0,
                Target::Host(Box::new(move |x| v.borrow_mut().push(x))),
                5,
                -5,
                16,
                16,
                Easing::Quartic,
            )
            .unwrap();
        assert_eq!(engine.run(1_000), Ok(1));
        assert_eq!(*values.borrow(), [-5]);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_late_poll_catches_up() {
        let mut engine = engine();
        let values = Rc::new(RefCell::new(Vec::new()));
        let v = values.clone();
        engine
            .animate(
                0,
                Target::Host(Box::new(move |x| v.borrow_mut().push(x))),
                0,
                100,
                40,
                10,
                Easing::Linear,
            )
            .unwrap();
        assert_eq!(engine.run(500), Ok(4));
        assert_eq!(*values.borrow(), [25, 50, 75, 100]);
    }

    #[test]
    fn test_backlight_fade_writes_duty() {
        let mut engine = engine();
        engine.backlight_fade(0, 0, 128, 20, 10).unwrap();
        engine.run(10).unwrap();
        assert_eq!(engine.buffer().bus().peek8(REG_PWM_DUTY), 64);
        engine.run(20).unwrap();
        assert_eq!(engine.buffer().bus().peek8(REG_PWM_DUTY), 128);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_new_fade_supersedes_old() {
        let mut engine = engine();
        let first = engine.backlight_fade(0, 128, 0, 100, 10).unwrap();
        engine.run(10).unwrap();
        let second = engine.backlight_fade(10, 20, 128, 10, 10).unwrap();
        assert!(!engine.is_animating(first));
        assert!(engine.is_animating(second));

        assert_eq!(engine.run(20), Ok(1));
        assert_eq!(engine.buffer().bus().peek8(REG_PWM_DUTY), 128);
        assert_eq!(engine.run(1_000), Ok(0));
    }

    #[test]
    fn test_cancel_animation() {
        let mut engine = engine();
        let values = Rc::new(RefCell::new(Vec::new()));
        let v = values.clone();
        let handle = engine
            .animate(
                0,
                Target::Host(Box::new(move |x| v.borrow_mut().push(x))),
                0,
                10,
                100,
                10,
                Easing::Linear,
            )
            .unwrap();
        engine.run(10).unwrap();
        assert!(engine.cancel_animation(handle));
        assert!(!engine.cancel_animation(handle));
        assert_eq!(engine.run(1_000), Ok(0));
        assert_eq!(*values.borrow(), [1]);
    }
}
