/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the timer core.
//!
//! Only **construction-time** operations can fail: binding a clock to an id,
//! and constructing a timer (which reserves its slot in the owning service).
//! Once a timer exists, `start`, `cancel`, `advance` and `notify_jump` have
//! no failure path.
//!
//! Every variant is a caller contract violation.  They are reported instead
//! of being silently absorbed so the mistake surfaces at the call site.

use thiserror::Error;

use super::ClockId;

/// Errors returned by [`SchedulingContext`](crate::context::SchedulingContext)
/// and the timer constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// A timer or query referenced a clock id that was never bound.
    #[error("clock {id} is not bound to a timer service")]
    UnknownClock { id: ClockId },

    /// [`bind`](crate::context::SchedulingContext::bind) was called twice for
    /// the same id.
    #[error("clock {id} is already bound to a timer service")]
    ClockAlreadyBound { id: ClockId },

    /// Clock id `0` belongs to the system clock and cannot be rebound.
    ///
    /// Supply a different system source through
    /// [`SchedulingContext::with_system_clock`](crate::context::SchedulingContext::with_system_clock)
    /// instead.
    #[error("clock {id} is reserved for the system clock")]
    ReservedClock { id: ClockId },

    /// Every timer slot of the service is taken by a live timer.
    ///
    /// The capacity is fixed when the clock is bound; timers release their
    /// slot when dropped.
    #[error("timer service for clock {id} is full ({capacity} timers)")]
    CapacityExhausted { id: ClockId, capacity: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
