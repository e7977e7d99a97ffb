//! Per-clock timer service: the ordered set of armed timers for one clock id,
//! and the dispatch loop that fires them.
//!
//! # Dispatch
//! [`TimerService::advance`] is the single entry point that fires timers.  For
//! every armed timer whose trigger is `<= current`, earliest first (ties in
//! registration order):
//!
//! 1. the timer is unlinked from the ordered set;
//! 2. its variant computes the next trigger: single-shot timers stay
//!    unarmed, repeating timers are re-linked at `previous + period`;
//! 3. its action runs, with no internal borrow held.
//!
//! Because of (3) an action may freely start, cancel or drop any timer
//! (itself included), and may even call `advance` again: the nested call
//! fires whatever is due at that moment and the outer loop then carries on
//! with what is left.
//!
//! # Callback faults
//! A panicking action unwinds out of `advance` to whoever drove it.  The
//! registry is consistent at that point (the timer that panicked has already
//! been handled as in steps 1 and 2), so the driver may catch the panic and call
//! `advance` again to fire the remaining due timers.
//!
//! # Threading
//! A service is `!Send` and `!Sync`: every operation on one clock happens on a
//! single execution context.  There is no locking anywhere in the core.

pub mod error;
mod registry;

pub use error::TimerError;
pub(crate) use registry::SlotId;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::time::{Duration, Instant};
use crate::timer::{Action, JumpPolicy, TimerKind};
use registry::Registry;

// ── Clock identifiers ─────────────────────────────────────────────────────────

/// Selects which independent clock (and therefore which [`TimerService`]) a
/// timer belongs to.
pub type ClockId = u32;

/// The real/system clock.  Always bound.
pub const SYSTEM_CLOCK_ID: ClockId = 0;

// ── TimerService ──────────────────────────────────────────────────────────────

/// The armed timers of one clock, kept in ascending trigger order.
///
/// A service holds no timer objects, only the slots timers reserved in it.
/// Timers keep an `Rc` to their service, so a service can never be dropped
/// while one of its timers is alive.
pub struct TimerService {
    id: ClockId,
    clock: Rc<dyn Clock>,
    registry: RefCell<Registry>,
}

impl TimerService {
    /// A service for clock `id` with room for `capacity` live timers.
    ///
    /// This is the only place the service allocates.
    pub(crate) fn new(id: ClockId, clock: Rc<dyn Clock>, capacity: usize) -> Self {
        Self {
            id,
            clock,
            registry: RefCell::new(Registry::with_capacity(capacity)),
        }
    }

    pub fn id(&self) -> ClockId {
        self.id
    }

    /// Current reading of this service's clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Granularity of this service's clock.
    pub fn resolution(&self) -> Duration {
        self.clock.resolution()
    }

    /// Maximum number of live timers.
    pub fn capacity(&self) -> usize {
        self.registry.borrow().capacity()
    }

    /// Number of live timers (armed or not) holding a slot.
    pub fn allocated(&self) -> usize {
        self.registry.borrow().allocated()
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trigger instant of the earliest armed timer.
    pub fn next_trigger(&self) -> Option<Instant> {
        self.registry.borrow().earliest()
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Fires every armed timer whose trigger is `<= current`, in trigger
    /// order.  Returns the number of actions run by this call (nested calls
    /// count their own).
    pub fn advance(&self, current: Instant) -> usize {
        let mut fired = 0;

        loop {
            let (at, action) = {
                let mut registry = self.registry.borrow_mut();
                let Some((slot, at)) = registry.pop_due(current) else {
                    break;
                };

                let action = registry.take_action(slot);
                let displaced = match (registry.kind(slot).next_trigger_after(at), &action) {
                    (Some(next), Some(action)) => registry.schedule(slot, next, action.clone()),
                    _ => None,
                };
                debug_assert!(displaced.is_none(), "action was taken before re-linking");
                (at, action)
            };

            if let Some(action) = action {
                trace!(clock = self.id, trigger = %at, current = %current, "timer fired");
                fired += 1;
                action();
            }
        }

        if fired > 0 {
            debug!(clock = self.id, current = %current, fired, "advance complete");
        }
        fired
    }

    /// Advances to this service's own [`now`](Self::now).
    pub fn tick(&self) -> usize {
        self.advance(self.now())
    }

    /// Reports a discontinuous change of this clock's reading from `from` to
    /// `to`.
    ///
    /// Every armed timer applies its [`JumpPolicy`]; the ordering is rebuilt
    /// afterwards.  No action runs here; timers made due by the jump fire on
    /// the next [`advance`](Self::advance).
    pub fn notify_jump(&self, from: Instant, to: Instant) {
        let moved = self.registry.borrow_mut().apply_jump(from, to);
        warn!(
            clock = self.id,
            from = %from,
            to = %to,
            delta = %(to - from),
            armed = self.len(),
            moved,
            "clock jumped"
        );
    }

    // ── Slot management (used by `Timer`) ─────────────────────────────────────

    pub(crate) fn allocate(
        &self,
        kind: TimerKind,
        jump_policy: JumpPolicy,
    ) -> Result<SlotId, TimerError> {
        let mut registry = self.registry.borrow_mut();
        registry
            .allocate(kind, jump_policy)
            .ok_or(TimerError::CapacityExhausted {
                id: self.id,
                capacity: registry.capacity(),
            })
    }

    pub(crate) fn release(&self, slot: SlotId) {
        // Dropped after the borrow ends; see the registry module docs.
        let _action = self.registry.borrow_mut().release(slot);
    }

    /// Links `slot` at `at`, replacing any earlier registration.
    pub(crate) fn register(&self, slot: SlotId, at: Instant, action: Action) {
        let _displaced = self.registry.borrow_mut().schedule(slot, at, action);
        trace!(clock = self.id, at = %at, "timer registered");
    }

    /// Unlinks `slot` and drops its action.  Returns `false` if it was not
    /// armed.
    pub(crate) fn deregister(&self, slot: SlotId) -> bool {
        let (was_armed, _action) = {
            let mut registry = self.registry.borrow_mut();
            (registry.unschedule(slot), registry.take_action(slot))
        };
        if was_armed {
            debug!(clock = self.id, "timer cancelled");
        }
        was_armed
    }

    pub(crate) fn is_registered(&self, slot: SlotId) -> bool {
        self.registry.borrow().is_queued(slot)
    }

    pub(crate) fn trigger_of(&self, slot: SlotId) -> Option<Instant> {
        self.registry.borrow().trigger(slot)
    }

    pub(crate) fn set_kind_of(&self, slot: SlotId, kind: TimerKind) {
        self.registry.borrow_mut().set_kind(slot, kind);
    }

    pub(crate) fn jump_policy_of(&self, slot: SlotId) -> JumpPolicy {
        self.registry.borrow().jump_policy(slot)
    }

    pub(crate) fn set_jump_policy_of(&self, slot: SlotId, policy: JumpPolicy) {
        self.registry.borrow_mut().set_jump_policy(slot, policy);
    }
}

impl fmt::Debug for TimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("TimerService")
            .field("id", &self.id)
            .field("capacity", &registry.capacity())
            .field("allocated", &registry.allocated())
            .field("armed", &registry.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
