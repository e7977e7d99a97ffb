/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The external driver of one clock.
//!
//! A [`ClockDriver`] is what a hardware tick handler, main loop or test calls
//! periodically.  Each [`poll`](ClockDriver::poll) reads the clock and
//! compares the reading with the previous one:
//!
//! | Observation | Classification |
//! |---|---|
//! | reading went backwards | jump |
//! | moved forward by more than `max_step` | jump |
//! | anything else | normal tick |
//!
//! A jump is reported with [`TimerService::notify_jump`] before the service is
//! advanced to the new reading.  Without a `max_step` only backward moves are
//! treated as jumps.

use std::rc::Rc;

use tracing::trace;

use crate::service::TimerService;
use crate::time::{Duration, Instant};

/// Result of one [`ClockDriver::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// The clock reading the service was advanced to.
    pub now: Instant,
    /// Number of actions fired.
    pub fired: usize,
    /// Set when the reading was classified as a jump, with its origin.
    pub jumped_from: Option<Instant>,
}

/// Polls one clock, detects jumps and advances its service.
#[derive(Debug)]
pub struct ClockDriver {
    service: Rc<TimerService>,
    last: Instant,
    max_step: Option<Duration>,
}

impl ClockDriver {
    /// A driver anchored at the service's current reading.
    pub fn new(service: Rc<TimerService>, max_step: Option<Duration>) -> Self {
        let last = service.now();
        Self {
            service,
            last,
            max_step,
        }
    }

    pub fn service(&self) -> &Rc<TimerService> {
        &self.service
    }

    /// The reading seen by the previous poll (or at construction).
    pub fn last_observed(&self) -> Instant {
        self.last
    }

    /// `true` if moving from `from` to `to` is a discontinuity.
    pub fn is_jump(&self, from: Instant, to: Instant) -> bool {
        to < from || self.max_step.is_some_and(|max| to - from > max)
    }

    /// Reads the clock, reports a jump if one happened, then fires everything
    /// due at the new reading.
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.service.now();
        let from = self.last;
        // Updated first so a re-entrant poll from an action sees the new base.
        self.last = now;

        let jumped_from = if self.is_jump(from, now) {
            self.service.notify_jump(from, now);
            Some(from)
        } else {
            None
        };

        let fired = self.service.advance(now);
        trace!(clock = self.service.id(), now = %now, fired, "clock polled");

        PollOutcome {
            now,
            fired,
            jumped_from,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
