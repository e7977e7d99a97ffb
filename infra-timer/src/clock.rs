/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Clock sources a [`TimerService`](crate::service::TimerService) reads its
//! notion of "now" from.
//!
//! * [`SystemClock`]: wall-clock time since the Unix epoch.  Bound to the
//!   reserved clock id `0` unless the platform supplies its own source.
//! * [`ManualClock`]: a virtual clock that only moves when told to.  Used by
//!   tests and by the simulator to fast-forward, or to inject jumps.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::time::{Duration, Instant};

/// A source of the current instant for one clock id.
///
/// The core never reads hardware directly; every `now()` query goes through
/// this trait.
pub trait Clock {
    /// The current reading of this clock.
    fn now(&self) -> Instant;

    /// The granularity of [`now`](Self::now).
    ///
    /// Repeating timers never use a period shorter than this.
    fn resolution(&self) -> Duration;
}

// ── SystemClock ───────────────────────────────────────────────────────────────

/// Wall-clock time (`SystemTime`) in nanoseconds since the Unix epoch.
///
/// Wall-clock time may be adjusted by NTP or by hand; pair it with a
/// [`ClockDriver`](crate::driver::ClockDriver) so such adjustments are reported
/// as jumps.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    resolution: Duration,
}

impl SystemClock {
    /// Default reported granularity: 1 µs.
    pub const DEFAULT_RESOLUTION: Duration = Duration::from_micros(1);

    pub fn new() -> Self {
        Self::with_resolution(Self::DEFAULT_RESOLUTION)
    }

    pub fn with_resolution(resolution: Duration) -> Self {
        Self { resolution }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => Instant::EPOCH + Duration::from_std(since),
            // Host clock set before 1970.
            Err(e) => Instant::EPOCH - Duration::from_std(e.duration()),
        }
    }

    fn resolution(&self) -> Duration {
        self.resolution
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// A clock whose reading is set explicitly.
///
/// Moving the clock does **not** fire any timer by itself; the owner still
/// has to call [`TimerService::advance`](crate::service::TimerService::advance)
/// (or poll a [`ClockDriver`](crate::driver::ClockDriver)).
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
    resolution: Duration,
}

impl ManualClock {
    /// A clock reading `start` with a 1 ns resolution.
    pub fn new(start: Instant) -> Self {
        Self::with_resolution(start, Duration::from_nanos(1))
    }

    pub fn with_resolution(start: Instant, resolution: Duration) -> Self {
        Self {
            now: Cell::new(start),
            resolution,
        }
    }

    /// Moves the reading to `instant`, forwards or backwards.
    pub fn set(&self, instant: Instant) {
        self.now.set(instant);
    }

    /// Moves the reading by `by` (negative values move it back) and returns
    /// the new reading.
    pub fn advance_by(&self, by: Duration) -> Instant {
        let next = self.now.get() + by;
        self.now.set(next);
        next
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn resolution(&self) -> Duration {
        self.resolution
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
