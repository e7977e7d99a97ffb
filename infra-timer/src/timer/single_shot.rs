/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::ops::Deref;

use tracing::debug;

use super::{Action, JumpPolicy, Timer, TimerKind};
use crate::context::SchedulingContext;
use crate::service::{ClockId, TimerError};
use crate::time::{Duration, Instant};

/// A timer that fires its action once, then disarms.
///
/// The action never runs before the requested instant, and runs at most once
/// per `start_*` call.
#[derive(Debug)]
pub struct TimerSingleShot {
    timer: Timer,
}

impl TimerSingleShot {
    /// An unarmed single-shot timer on `clock`.
    ///
    /// # Errors
    /// [`TimerError::UnknownClock`] if `clock` is not bound,
    /// [`TimerError::CapacityExhausted`] if its service has no free slot.
    pub fn new(context: &SchedulingContext, clock: ClockId) -> Result<Self, TimerError> {
        let timer = Timer::new(context, clock, TimerKind::SingleShot, JumpPolicy::KeepAbsolute)?;
        Ok(Self { timer })
    }

    /// A timer already armed for the absolute instant `at`.
    pub fn new_at(
        context: &SchedulingContext,
        clock: ClockId,
        at: Instant,
        action: Action,
    ) -> Result<Self, TimerError> {
        let timer = Self::new(context, clock)?;
        timer.start_at(at, action);
        Ok(timer)
    }

    /// A timer already armed to fire `after` from now.
    pub fn new_after(
        context: &SchedulingContext,
        clock: ClockId,
        after: Duration,
        action: Action,
    ) -> Result<Self, TimerError> {
        let timer = Self::new(context, clock)?;
        timer.start_after(after, action);
        Ok(timer)
    }

    /// Arms the timer for the absolute instant `at`.  An earlier registration
    /// is replaced.
    pub fn start_at(&self, at: Instant, action: Action) {
        debug!(clock = self.clock_id(), at = %at, "single-shot timer started");
        self.timer.set_next_trigger_time(at, action);
    }

    /// Arms the timer for `now() + after`.
    pub fn start_after(&self, after: Duration, action: Action) {
        self.start_at(self.now() + after, action);
    }
}

impl Deref for TimerSingleShot {
    type Target = Timer;

    fn deref(&self) -> &Timer {
        &self.timer
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::action;
    use std::cell::Cell;
    use std::rc::Rc;

    const CLOCK: ClockId = 1;

    fn setup() -> (SchedulingContext, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(Instant::from_millis(100)));
        let mut ctx = SchedulingContext::new();
        ctx.bind(CLOCK, clock.clone(), 4).unwrap();
        (ctx, clock)
    }

    fn counter() -> (Rc<Cell<u32>>, Action) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        (hits, action(move || h.set(h.get() + 1)))
    }

    #[test]
    fn fires_exactly_once_at_the_requested_duration() {
        let (ctx, clock) = setup();
        let service = ctx.service(CLOCK).unwrap().clone();
        let (hits, act) = counter();

        let timer = TimerSingleShot::new(&ctx, CLOCK).unwrap();
        timer.start_after(Duration::from_millis(50), act);
        assert_eq!(timer.next_trigger(), Some(Instant::from_millis(150)));

        // just before the trigger: nothing
        service.advance(Instant::from_millis(149));
        assert_eq!(hits.get(), 0);
        assert!(timer.armed());

        clock.set(Instant::from_millis(150));
        service.tick();
        assert_eq!(hits.get(), 1);
        assert!(!timer.armed());

        service.advance(Instant::from_millis(10_000));
        assert_eq!(hits.get(), 1, "must not fire a second time");
    }

    #[test]
    fn absolute_start_fires_once_reached() {
        let (ctx, _clock) = setup();
        let service = ctx.service(CLOCK).unwrap().clone();
        let (hits, act) = counter();

        let timer =
            TimerSingleShot::new_at(&ctx, CLOCK, Instant::from_millis(120), act).unwrap();
        assert!(timer.armed());

        service.advance(Instant::from_millis(130));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn start_in_the_past_fires_on_next_advance() {
        let (ctx, _clock) = setup();
        let service = ctx.service(CLOCK).unwrap().clone();
        let (hits, act) = counter();

        let _timer = TimerSingleShot::new_at(&ctx, CLOCK, Instant::from_millis(10), act).unwrap();
        service.advance(Instant::from_millis(100));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn can_be_restarted_after_firing() {
        let (ctx, _clock) = setup();
        let service = ctx.service(CLOCK).unwrap().clone();
        let (hits, act) = counter();

        let timer = TimerSingleShot::new_after(&ctx, CLOCK, Duration::from_millis(5), act.clone())
            .unwrap();
        service.advance(Instant::from_millis(105));
        assert_eq!(hits.get(), 1);

        timer.start_at(Instant::from_millis(200), act);
        assert!(timer.armed());
        service.advance(Instant::from_millis(200));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (ctx, _clock) = setup();
        let service = ctx.service(CLOCK).unwrap().clone();
        let (hits, act) = counter();

        let never_started = TimerSingleShot::new(&ctx, CLOCK).unwrap();
        never_started.cancel();
        assert!(!never_started.armed());

        let timer = TimerSingleShot::new_after(&ctx, CLOCK, Duration::from_millis(1), act).unwrap();
        timer.cancel();
        timer.cancel();
        assert!(!timer.armed());

        service.advance(Instant::from_millis(1_000));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn cancel_releases_the_action() {
        let (ctx, _clock) = setup();
        let (_hits, act) = counter();

        let timer = TimerSingleShot::new_after(&ctx, CLOCK, Duration::from_millis(1), act.clone())
            .unwrap();
        assert_eq!(Rc::strong_count(&act), 2);
        timer.cancel();
        assert_eq!(Rc::strong_count(&act), 1);
    }
}
