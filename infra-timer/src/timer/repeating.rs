/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::cell::Cell;
use std::ops::Deref;

use tracing::{debug, warn};

use super::{Action, JumpPolicy, Timer, TimerKind};
use crate::context::SchedulingContext;
use crate::service::{ClockId, TimerError};
use crate::time::{Duration, Instant};

/// A timer that fires every `period` until cancelled.
///
/// Each trigger is computed from the **previous trigger**, not from the time
/// the action ran, so the phase does not drift with dispatch latency.  Absent
/// clock jumps the n-th firing is due at `first_trigger + (n - 1) * period`;
/// an advance that skips several periods fires once per missed period.
///
/// Clock jumps rebase the schedule by default ([`JumpPolicy::Rebase`]): the
/// time remaining until the next firing is preserved.
#[derive(Debug)]
pub struct TimerRepeating {
    timer: Timer,
    period: Cell<Duration>,
}

impl TimerRepeating {
    /// An unarmed repeating timer on `clock`.
    ///
    /// # Errors
    /// [`TimerError::UnknownClock`] if `clock` is not bound,
    /// [`TimerError::CapacityExhausted`] if its service has no free slot.
    pub fn new(context: &SchedulingContext, clock: ClockId) -> Result<Self, TimerError> {
        let kind = TimerKind::Repeating {
            period: Duration::ZERO,
        };
        let timer = Timer::new(context, clock, kind, JumpPolicy::Rebase)?;
        Ok(Self {
            timer,
            period: Cell::new(Duration::ZERO),
        })
    }

    /// A timer already started with [`start`](Self::start).
    pub fn new_started(
        context: &SchedulingContext,
        clock: ClockId,
        period: Duration,
        action: Action,
    ) -> Result<Self, TimerError> {
        let timer = Self::new(context, clock)?;
        timer.start(period, action);
        Ok(timer)
    }

    /// A timer already started with [`start_immediately`](Self::start_immediately).
    pub fn new_started_immediately(
        context: &SchedulingContext,
        clock: ClockId,
        period: Duration,
        action: Action,
    ) -> Result<Self, TimerError> {
        let timer = Self::new(context, clock)?;
        timer.start_immediately(period, action);
        Ok(timer)
    }

    /// Arms the timer with its first trigger at `now() + period`.
    pub fn start(&self, period: Duration, action: Action) {
        let period = self.arm_period(period);
        self.arm_at(self.now() + period, action);
    }

    /// Arms the timer with its first trigger at `now()`, so it fires on the
    /// very next advance, then every `period`.
    pub fn start_immediately(&self, period: Duration, action: Action) {
        self.arm_period(period);
        self.arm_at(self.now(), action);
    }

    /// The period passed to the last `start*` call.
    pub fn trigger_period(&self) -> Duration {
        self.period.get()
    }

    fn arm_at(&self, first: Instant, action: Action) {
        debug!(
            clock = self.clock_id(),
            first = %first,
            period = %self.period.get(),
            "repeating timer started"
        );
        self.timer.set_next_trigger_time(first, action);
    }

    /// Records `period` and installs the effective period, which is never
    /// finer than the clock can resolve (and never zero).
    fn arm_period(&self, period: Duration) -> Duration {
        self.period.set(period);

        let floor = self.resolution().max(Duration::from_nanos(1));
        let effective = if period < floor {
            warn!(
                clock = self.clock_id(),
                requested = %period,
                effective = %floor,
                "repeating period below clock resolution, clamped"
            );
            floor
        } else {
            period
        };

        self.timer
            .set_kind(TimerKind::Repeating { period: effective });
        effective
    }
}

impl Deref for TimerRepeating {
    type Target = Timer;

    fn deref(&self) -> &Timer {
        &self.timer
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
