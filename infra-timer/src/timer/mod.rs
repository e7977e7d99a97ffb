/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Timers: the base [`Timer`] plus the two concrete variants.
//!
//! ```text
//!                 start_*()                      fires
//!   Unarmed ───────────────────►  Armed  ─────────────────────►  Unarmed   (TimerSingleShot)
//!      ▲                          │   │
//!      └──────── cancel() ────────┘   └── fires, re-armed at
//!                                         previous + period ──►  Armed     (TimerRepeating)
//! ```
//!
//! A timer reserves one slot in its clock's [`TimerService`] when it is
//! constructed and gives it back when dropped.  Starting, cancelling and
//! firing only link or unlink that slot, so none of them allocate.
//!
//! # Variant behaviour
//! The variant-specific extension points are a closed set, dispatched with a
//! `match` on [`TimerKind`]:
//!
//! | Extension point | `TimerSingleShot` | `TimerRepeating` |
//! |---|---|---|
//! | next trigger after firing | none (stays unarmed) | previous trigger + period |
//! | default [`JumpPolicy`] | `KeepAbsolute` | `Rebase` |
//!
//! # Actions and ownership
//! An [`Action`] is a reference-counted closure.  Build it once with
//! [`action`] and clone it into every `start_*` call; cloning an `Rc` does not
//! allocate.  An action that captures a strong handle to its own timer keeps
//! that timer alive while it is armed; capture a `Weak` when the timer should
//! be dropped by its owner.

mod repeating;
mod single_shot;

pub use repeating::TimerRepeating;
pub use single_shot::TimerSingleShot;

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::context::SchedulingContext;
use crate::service::{ClockId, SlotId, TimerError, TimerService};
use crate::time::{Duration, Instant};

/// The callback a timer invokes when it fires.
pub type Action = Rc<dyn Fn()>;

/// Wraps a closure into an [`Action`].
pub fn action(f: impl Fn() + 'static) -> Action {
    Rc::new(f)
}

// ── JumpPolicy ────────────────────────────────────────────────────────────────

/// How an armed timer reacts when its clock jumps from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// Keep the absolute trigger instant.
    ///
    /// Jumping forward past the trigger makes the timer fire on the next
    /// advance; jumping backward delays it by the size of the jump.
    #[default]
    KeepAbsolute,

    /// Move the trigger by `to - from`, so the remaining wait is unchanged.
    Rebase,
}

impl JumpPolicy {
    /// The trigger instant after a jump from `from` to `to`.
    pub fn jumped(self, trigger: Instant, from: Instant, to: Instant) -> Instant {
        match self {
            JumpPolicy::KeepAbsolute => trigger,
            JumpPolicy::Rebase => trigger + (to - from),
        }
    }
}

// ── TimerKind ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    SingleShot,
    /// `period` is already clamped to the clock resolution.
    Repeating { period: Duration },
}

impl TimerKind {
    /// The trigger that follows a firing at `fired_at`, or `None` when the
    /// timer stays unarmed.
    pub(crate) fn next_trigger_after(self, fired_at: Instant) -> Option<Instant> {
        match self {
            TimerKind::SingleShot => None,
            TimerKind::Repeating { period } => {
                let next = fired_at + period;
                // Saturated at Instant::MAX: re-arming there would fire forever.
                (next > fired_at).then_some(next)
            }
        }
    }
}

// ── Timer ─────────────────────────────────────────────────────────────────────

/// The state shared by every timer variant: the owning service and the slot
/// reserved in it.
///
/// Not constructed directly; use [`TimerSingleShot`] or [`TimerRepeating`],
/// both of which dereference to `Timer`.
pub struct Timer {
    service: Rc<TimerService>,
    slot: SlotId,
}

impl Timer {
    pub(crate) fn new(
        context: &SchedulingContext,
        clock: ClockId,
        kind: TimerKind,
        jump_policy: JumpPolicy,
    ) -> Result<Self, TimerError> {
        let service = Rc::clone(context.service(clock)?);
        let slot = service.allocate(kind, jump_policy)?;
        Ok(Self { service, slot })
    }

    /// Disarms the timer.  A no-op when it is not armed.
    pub fn cancel(&self) {
        self.service.deregister(self.slot);
    }

    /// `true` while the timer is registered with its service.
    pub fn armed(&self) -> bool {
        self.service.is_registered(self.slot)
    }

    /// The instant the timer will fire at, or `None` when unarmed.
    pub fn next_trigger(&self) -> Option<Instant> {
        self.service.trigger_of(self.slot)
    }

    /// Current reading of this timer's clock.
    pub fn now(&self) -> Instant {
        self.service.now()
    }

    /// Granularity of this timer's clock.
    pub fn resolution(&self) -> Duration {
        self.service.resolution()
    }

    pub fn clock_id(&self) -> ClockId {
        self.service.id()
    }

    pub fn jump_policy(&self) -> JumpPolicy {
        self.service.jump_policy_of(self.slot)
    }

    /// Overrides how this timer reacts to clock jumps.  Takes effect for the
    /// next jump, whether or not the timer is currently armed.
    pub fn set_jump_policy(&self, policy: JumpPolicy) {
        self.service.set_jump_policy_of(self.slot, policy);
    }

    /// Stores `action` and (re)links the timer at `at`, replacing any earlier
    /// registration.
    pub(crate) fn set_next_trigger_time(&self, at: Instant, action: Action) {
        self.service.register(self.slot, at, action);
    }

    pub(crate) fn set_kind(&self, kind: TimerKind) {
        self.service.set_kind_of(self.slot, kind);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.service.release(self.slot);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("clock", &self.clock_id())
            .field("armed", &self.armed())
            .field("next_trigger", &self.next_trigger())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
