//! Value animations
//!
//! An animation moves an integer from `from` to `to` over `duration_ms`,
//! one step every `period_ms`, shaped by an [`Easing`] curve. Each step
//! writes the value either to a host closure or to a chip register through
//! the command buffer (backlight duty, for example).
//!
//! The animator only holds the descriptors; the engine's timer list drives
//! [`Animator::step`].

use alloc::boxed::Box;
use heapless::Vec;

use crate::buffer::{BufferError, CommandBuffer, Flush};
use crate::bus::Bus;
use crate::timer::TimerId;

/// Most animations running at once
pub const MAX_ANIMATIONS: usize = 8;

/// Progress curve, `f(t)` for `t` in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Easing {
    /// `t`
    Linear,
    /// `t²`
    Quadratic,
    /// `t³`
    Cubic,
    /// `t⁴`
    Quartic,
}

impl Easing {
    fn power(self) -> u32 {
        match self {
            Easing::Linear => 1,
            Easing::Quadratic => 2,
            Easing::Cubic => 3,
            Easing::Quartic => 4,
        }
    }

    /// Value at `elapsed` of `duration`
    ///
    /// Integer arithmetic; exact at both ends.
    pub fn interpolate(self, from: i32, to: i32, elapsed: u32, duration: u32) -> i32 {
        if duration == 0 || elapsed >= duration {
            return to;
        }
        let mut delta = to as i128 - from as i128;
        for _ in 0..self.power() {
            delta = delta * elapsed as i128 / duration as i128;
        }
        (from as i128 + delta) as i32
    }
}

/// Where an animation writes its value
pub enum Target {
    /// Host-side sink
    Host(Box<dyn FnMut(i32)>),
    /// Chip register, written with `CMD_MEMWRITE`
    Register(u32),
}

/// Handle to a running animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnimationHandle {
    index: u8,
    generation: u16,
}

/// Errors from starting or stepping an animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationError {
    /// Period is zero or longer than the duration
    InvalidPeriod,
    SlotsFull,
    Buffer(BufferError),
}

impl From<BufferError> for AnimationError {
    fn from(e: BufferError) -> Self {
        AnimationError::Buffer(e)
    }
}

/// Whether an animation needs more steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Running,
    /// Last value written; the descriptor is gone
    Finished,
}

struct Animation {
    target: Target,
    from: i32,
    to: i32,
    elapsed: u32,
    duration: u32,
    period: u32,
    easing: Easing,
    timer: Option<TimerId>,
}

struct Slot {
    generation: u16,
    animation: Option<Animation>,
}

/// Running animations, plus the one backlight fade
pub struct Animator {
    slots: Vec<Slot, MAX_ANIMATIONS>,
    backlight: Option<AnimationHandle>,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            backlight: None,
        }
    }

    /// Register an animation; the caller schedules its timer
    ///
    /// `duration_ms` should be a multiple of `period_ms`. If it is not, the
    /// last step is clamped to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        target: Target,
        from: i32,
        to: i32,
        duration_ms: u32,
        period_ms: u32,
        easing: Easing,
    ) -> Result<AnimationHandle, AnimationError> {
        if period_ms == 0 || period_ms > duration_ms {
            return Err(AnimationError::InvalidPeriod);
        }
        let animation = Animation {
            target,
            from,
            to,
            elapsed: 0,
            duration: duration_ms,
            period: period_ms,
            easing,
            timer: None,
        };

        let index = match self.slots.iter().position(|s| s.animation.is_none()) {
            Some(index) => index,
            None => {
                self.slots
                    .push(Slot {
                        generation: 0,
                        animation: None,
                    })
                    .map_err(|_| AnimationError::SlotsFull)?;
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.animation = Some(animation);
        Ok(AnimationHandle {
            index: index as u8,
            generation: slot.generation,
        })
    }

    /// Remember which timer drives `handle`
    pub fn set_timer(&mut self, handle: AnimationHandle, timer: TimerId) {
        if let Some(animation) = self.get_mut(handle) {
            animation.timer = Some(timer);
        }
    }

    /// Mark `handle` as the backlight fade, returning the fade it replaces
    pub fn set_backlight(&mut self, handle: AnimationHandle) -> Option<AnimationHandle> {
        self.backlight.replace(handle).filter(|old| self.is_running(*old))
    }

    pub fn backlight(&self) -> Option<AnimationHandle> {
        self.backlight.filter(|h| self.is_running(*h))
    }

    /// Timer driving `handle`, if one was recorded
    pub fn timer(&self, handle: AnimationHandle) -> Option<TimerId> {
        self.get(handle).and_then(|a| a.timer)
    }

    pub fn is_running(&self, handle: AnimationHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.animation.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance one period and write the new value
    ///
    /// Returns [`Step::Finished`] after writing `to`; the caller cancels the
    /// timer returned by [`cancel`](Self::cancel) or lets a one-shot lapse.
    pub fn step<B: Bus>(
        &mut self,
        handle: AnimationHandle,
        buffer: &mut CommandBuffer<B>,
    ) -> Result<Step, AnimationError> {
        let Some(animation) = self.get_mut(handle) else {
            return Ok(Step::Finished);
        };
        animation.elapsed = (animation.elapsed + animation.period).min(animation.duration);
        let value = animation.easing.interpolate(
            animation.from,
            animation.to,
            animation.elapsed,
            animation.duration,
        );
        let done = animation.elapsed >= animation.duration;

        match &mut animation.target {
            Target::Host(sink) => sink(value),
            Target::Register(address) => {
                let address = *address;
                buffer.write_reg(address, value as u32)?;
                if let Flush::Recovered = buffer.flush()? {
                    warn!("animation: register write lost to a coprocessor reset");
                }
            }
        }

        if done {
            self.remove(handle);
            Ok(Step::Finished)
        } else {
            Ok(Step::Running)
        }
    }

    /// Stop an animation where it is, returning its timer
    pub fn cancel(&mut self, handle: AnimationHandle) -> Option<TimerId> {
        self.remove(handle).and_then(|a| a.timer)
    }

    fn remove(&mut self, handle: AnimationHandle) -> Option<Animation> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let animation = slot.animation.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if self.backlight == Some(handle) {
            self.backlight = None;
        }
        Some(animation)
    }

    fn get(&self, handle: AnimationHandle) -> Option<&Animation> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.animation.as_ref()
    }

    fn get_mut(&mut self, handle: AnimationHandle) -> Option<&mut Animation> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.animation.as_mut()
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
    use crate::regs::REG_PWM_DUTY;

    fn sink() -> (Target, Rc<RefCell<StdVec<i32>>>) {
        let values = Rc::new(RefCell::new(StdVec::new()));
        let v = values.clone();
        (Target::Host(Box::new(move |x| v.borrow_mut().push(x))), values)
    }

    fn buffer() -> CommandBuffer<FakeEve> {
        CommandBuffer::new(FakeEve::new(), EngineConfig::default())
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::Quadratic, Easing::Cubic, Easing::Quartic] {
            assert_eq!(easing.interpolate(10, 90, 0, 100), 10);
            assert_eq!(easing.interpolate(10, 90, 100, 100), 90);
            assert_eq!(easing.interpolate(90, 10, 100, 100), 10);
        }
    }

    #[test]
    fn test_easing_curves() {
        assert_eq!(Easing::Linear.interpolate(0, 1000, 50, 100), 500);
        assert_eq!(Easing::Quadratic.interpolate(0, 1000, 50, 100), 250);
        assert_eq!(Easing::Cubic.interpolate(0, 1000, 50, 100), 125);
        assert_eq!(Easing::Quartic.interpolate(0, 1000, 50, 100), 62);
        assert_eq!(Easing::Linear.interpolate(100, 0, 25, 100), 75);
        assert_eq!(
            Easing::Linear.interpolate(i32::MIN, i32::MAX, 1, 2),
            -1
        );
    }

    #[test]
    fn test_single_step_lands_on_target() {
        for easing in [Easing::Linear, Easing::Quadratic, Easing::Cubic, Easing::Quartic] {
            let mut animator = Animator::new();
            let mut buf = buffer();
            let (target, values) = sink();
            let h = animator.start(target, 0, 128, 20, 20, easing).unwrap();
            assert_eq!(animator.step(h, &mut buf), Ok(Step::Finished));
            assert_eq!(*values.borrow(), [128]);
            assert!(!animator.is_running(h));
        }
    }

    #[test]
    fn test_steps_until_duration() {
        let mut animator = Animator::new();
        let mut buf = buffer();
        let (target, values) = sink();
        let h = animator.start(target, 0, 100, 40, 10, Easing::Linear).unwrap();
        let mut steps = 0;
        while animator.step(h, &mut buf).unwrap() == Step::Running {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(*values.borrow(), [25, 50, 75, 100]);
    }

    #[test]
    fn test_uneven_period_clamps_last_step() {
        let mut animator = Animator::new();
        let mut buf = buffer();
        let (target, values) = sink();
        let h = animator.start(target, 0, 100, 25, 10, Easing::Linear).unwrap();
        while animator.step(h, &mut buf).unwrap() == Step::Running {}
        assert_eq!(*values.borrow(), [40, 80, 100]);
    }

    #[test]
    fn test_register_target_writes_chip() {
        let mut animator = Animator::new();
        let mut buf = buffer();
        let h = animator
            .start(Target::Register(REG_PWM_DUTY), 0, 128, 20, 10, Easing::Linear)
            .unwrap();
        animator.step(h, &mut buf).unwrap();
        assert_eq!(buf.bus().peek8(REG_PWM_DUTY), 64);
        animator.step(h, &mut buf).unwrap();
        assert_eq!(buf.bus().peek8(REG_PWM_DUTY), 128);
    }

    #[test]
    fn test_cancel_and_stale_handles() {
        let mut animator = Animator::new();
        let mut buf = buffer();
        let (target, values) = sink();
        let h = animator.start(target, 0, 10, 100, 10, Easing::Linear).unwrap();
        animator.set_backlight(h);
        assert_eq!(animator.backlight(), Some(h));

        assert_eq!(animator.cancel(h), None);
        assert!(animator.backlight().is_none());
        assert_eq!(animator.step(h, &mut buf), Ok(Step::Finished));
        assert!(values.borrow().is_empty());

        let (target, _) = sink();
        let again = animator.start(target, 0, 10, 100, 10, Easing::Linear).unwrap();
        assert_ne!(again, h);
        assert!(!animator.is_running(h));
    }

    #[test]
    fn test_rejects_bad_period() {
        let mut animator = Animator::new();
        let (target, _) = sink();
        assert_eq!(
            animator.start(target, 0, 1, 10, 0, Easing::Linear).err(),
            Some(AnimationError::InvalidPeriod)
        );
        let (target, _) = sink();
        assert_eq!(
            animator.start(target, 0, 1, 10, 20, Easing::Linear).err(),
            Some(AnimationError::InvalidPeriod)
        );
    }
}
