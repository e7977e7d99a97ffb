/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The scheduling context: one [`TimerService`] per clock id.
//!
//! The application owns a `SchedulingContext` and passes it by reference to
//! every timer constructor; there is no hidden process-wide registry.  Clock
//! id [`SYSTEM_CLOCK_ID`] is bound at construction; every other id must be
//! bound with [`SchedulingContext::bind`] before a timer can use it.
//!
//! Services are handed out as `Rc<TimerService>` so the driver of a clock can
//! keep its own handle, independent of the context's lifetime.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::info;

use crate::clock::{Clock, ManualClock, SystemClock};
use crate::config::{ClockConfig, ClockConfigManager, ClockKind};
use crate::driver::ClockDriver;
use crate::service::{ClockId, TimerError, TimerService, SYSTEM_CLOCK_ID};
use crate::time::{Duration, Instant};

/// Timer slots reserved for a clock when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 64;

// ── BoundClock ────────────────────────────────────────────────────────────────

/// A clock bound from configuration, with the handles its driver needs.
#[derive(Debug, Clone)]
pub struct BoundClock {
    pub service: Rc<TimerService>,
    /// Set for [`ClockKind::Manual`] clocks so the owner can move them.
    pub manual: Option<Rc<ManualClock>>,
    /// Jump-detection threshold from the configuration.
    pub max_step: Option<Duration>,
}

impl BoundClock {
    pub fn id(&self) -> ClockId {
        self.service.id()
    }

    /// A driver for this clock, anchored at its current reading.
    pub fn driver(&self) -> ClockDriver {
        ClockDriver::new(self.service.clone(), self.max_step)
    }
}

// ── SchedulingContext ─────────────────────────────────────────────────────────

/// Maps clock ids to their timer services.
#[derive(Debug)]
pub struct SchedulingContext {
    services: BTreeMap<ClockId, Rc<TimerService>>,
}

impl SchedulingContext {
    /// A context with the host [`SystemClock`] bound to [`SYSTEM_CLOCK_ID`].
    pub fn new() -> Self {
        Self::with_system_clock(Rc::new(SystemClock::new()), DEFAULT_CAPACITY)
    }

    /// A context whose clock id `0` reads from `clock`.
    ///
    /// This is how a platform layer supplies its own "current real instant"
    /// source, or how a test substitutes a [`ManualClock`] for it.
    pub fn with_system_clock(clock: Rc<dyn Clock>, capacity: usize) -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            SYSTEM_CLOCK_ID,
            Rc::new(TimerService::new(SYSTEM_CLOCK_ID, clock, capacity)),
        );
        Self { services }
    }

    /// Builds a context from a loaded configuration.
    ///
    /// Clock `0` keeps the system clock but takes its capacity and resolution
    /// from the configuration when present.  The returned list holds every
    /// bound clock, clock `0` first.
    ///
    /// # Errors
    /// Propagates [`bind`](Self::bind) failures; a configuration validated by
    /// [`ClockConfigManager`] never produces one.
    pub fn from_config(config: &ClockConfigManager) -> Result<(Self, Vec<BoundClock>), TimerError> {
        let system = config
            .get_clock_config(SYSTEM_CLOCK_ID)
            .cloned()
            .unwrap_or_else(ClockConfig::system_default);

        let mut ctx = Self::with_system_clock(
            Rc::new(SystemClock::with_resolution(system.resolution)),
            system.capacity,
        );
        let mut bound = vec![BoundClock {
            service: ctx.service(SYSTEM_CLOCK_ID)?.clone(),
            manual: None,
            max_step: system.max_step,
        }];

        for cfg in config.get_all_clocks().values() {
            if cfg.id == SYSTEM_CLOCK_ID {
                continue;
            }
            let (clock, manual): (Rc<dyn Clock>, Option<Rc<ManualClock>>) = match cfg.kind {
                ClockKind::Manual => {
                    let m = Rc::new(ManualClock::with_resolution(cfg.start, cfg.resolution));
                    let clock: Rc<dyn Clock> = m.clone();
                    (clock, Some(m))
                }
                ClockKind::System => {
                    let clock: Rc<dyn Clock> =
                        Rc::new(SystemClock::with_resolution(cfg.resolution));
                    (clock, None)
                }
            };
            let service = ctx.bind(cfg.id, clock, cfg.capacity)?;
            bound.push(BoundClock {
                service,
                manual,
                max_step: cfg.max_step,
            });
        }

        Ok((ctx, bound))
    }

    /// Binds clock `id` to `clock` with room for `capacity` timers.
    ///
    /// # Errors
    /// * [`TimerError::ReservedClock`] for [`SYSTEM_CLOCK_ID`].
    /// * [`TimerError::ClockAlreadyBound`] if `id` is already bound.
    pub fn bind(
        &mut self,
        id: ClockId,
        clock: Rc<dyn Clock>,
        capacity: usize,
    ) -> Result<Rc<TimerService>, TimerError> {
        if id == SYSTEM_CLOCK_ID {
            return Err(TimerError::ReservedClock { id });
        }
        if self.services.contains_key(&id) {
            return Err(TimerError::ClockAlreadyBound { id });
        }

        let service = Rc::new(TimerService::new(id, clock, capacity));
        info!(
            clock = id,
            capacity,
            now = %service.now(),
            resolution = %service.resolution(),
            "clock bound"
        );
        self.services.insert(id, service.clone());
        Ok(service)
    }

    /// The service for clock `id`.
    pub fn service(&self, id: ClockId) -> Result<&Rc<TimerService>, TimerError> {
        self.services
            .get(&id)
            .ok_or(TimerError::UnknownClock { id })
    }

    /// Current reading of clock `id`.
    pub fn now(&self, id: ClockId) -> Result<Instant, TimerError> {
        self.service(id).map(|s| s.now())
    }

    pub fn is_bound(&self, id: ClockId) -> bool {
        self.services.contains_key(&id)
    }

    /// Bound clock ids in ascending order.
    pub fn clock_ids(&self) -> impl Iterator<Item = ClockId> + '_ {
        self.services.keys().copied()
    }
}

impl Default for SchedulingContext {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{action, TimerSingleShot};
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn manual(at_ms: i64) -> Rc<ManualClock> {
        Rc::new(ManualClock::new(Instant::from_millis(at_ms)))
    }

    // ── Binding ───────────────────────────────────────────────────────────────

    #[test]
    fn system_clock_is_always_bound() {
        let ctx = SchedulingContext::new();
        assert!(ctx.is_bound(SYSTEM_CLOCK_ID));
        assert_eq!(ctx.clock_ids().collect::<Vec<_>>(), vec![SYSTEM_CLOCK_ID]);
        assert_eq!(
            ctx.service(SYSTEM_CLOCK_ID).unwrap().capacity(),
            DEFAULT_CAPACITY
        );
    }

    #[test]
    fn system_clock_id_cannot_be_rebound() {
        let mut ctx = SchedulingContext::new();
        let err = ctx.bind(SYSTEM_CLOCK_ID, manual(0), 4).unwrap_err();
        assert_eq!(err, TimerError::ReservedClock { id: 0 });
    }

    #[test]
    fn double_bind_is_rejected() {
        let mut ctx = SchedulingContext::new();
        ctx.bind(5, manual(0), 4).unwrap();
        let err = ctx.bind(5, manual(0), 4).unwrap_err();
        assert_eq!(err, TimerError::ClockAlreadyBound { id: 5 });
    }

    #[test]
    fn now_delegates_to_the_bound_clock() {
        let mut ctx = SchedulingContext::new();
        let clock = manual(250);
        ctx.bind(2, clock.clone(), 4).unwrap();
        assert_eq!(ctx.now(2).unwrap(), Instant::from_millis(250));
        clock.advance_by(Duration::from_millis(50));
        assert_eq!(ctx.now(2).unwrap(), Instant::from_millis(300));
        assert_eq!(ctx.now(9).unwrap_err(), TimerError::UnknownClock { id: 9 });
    }

    #[test]
    fn platform_can_supply_the_system_clock() {
        let clock = manual(42);
        let ctx = SchedulingContext::with_system_clock(clock.clone(), 2);
        assert_eq!(ctx.now(SYSTEM_CLOCK_ID).unwrap(), Instant::from_millis(42));
        assert_eq!(ctx.service(SYSTEM_CLOCK_ID).unwrap().capacity(), 2);
    }

    #[test]
    fn capacity_is_enforced_per_clock() {
        let mut ctx = SchedulingContext::new();
        ctx.bind(1, manual(0), 2).unwrap();

        let a = TimerSingleShot::new(&ctx, 1).unwrap();
        let _b = TimerSingleShot::new(&ctx, 1).unwrap();
        let err = TimerSingleShot::new(&ctx, 1).unwrap_err();
        assert_eq!(err, TimerError::CapacityExhausted { id: 1, capacity: 2 });

        // dropping a timer frees its slot
        drop(a);
        assert!(TimerSingleShot::new(&ctx, 1).is_ok());
    }

    // ── Independence of clocks ────────────────────────────────────────────────

    #[test]
    fn advancing_one_clock_never_fires_another() {
        let mut ctx = SchedulingContext::new();
        let s1 = ctx.bind(1, manual(0), 4).unwrap();
        let s2 = ctx.bind(2, manual(0), 4).unwrap();

        let hits1 = Rc::new(Cell::new(0));
        let hits2 = Rc::new(Cell::new(0));
        let (h1, h2) = (hits1.clone(), hits2.clone());
        let at = Instant::from_millis(10);
        let _t1 = TimerSingleShot::new_at(&ctx, 1, at, action(move || h1.set(h1.get() + 1))).unwrap();
        let _t2 = TimerSingleShot::new_at(&ctx, 2, at, action(move || h2.set(h2.get() + 1))).unwrap();

        s1.advance(Instant::from_millis(1_000));
        assert_eq!(hits1.get(), 1);
        assert_eq!(hits2.get(), 0);
        assert_eq!(s2.len(), 1);

        s2.advance(at);
        assert_eq!(hits2.get(), 1);
    }

    // ── from_config ───────────────────────────────────────────────────────────

    fn load(yaml: &str) -> ClockConfigManager {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        let mut mgr = ClockConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();
        mgr
    }

    #[test]
    fn from_config_binds_every_clock() {
        let mgr = load(
            r#"
clocks:
  0:
    kind: system
    capacity: 8
  1:
    kind: manual
    start_us: 5000
    resolution_us: 1000
    capacity: 3
    max_step_us: 20000
  7:
    kind: system
"#,
        );
        let (ctx, bound) = SchedulingContext::from_config(&mgr).unwrap();

        assert_eq!(ctx.clock_ids().collect::<Vec<_>>(), vec![0, 1, 7]);
        assert_eq!(bound.iter().map(BoundClock::id).collect::<Vec<_>>(), vec![0, 1, 7]);
        assert_eq!(ctx.service(0).unwrap().capacity(), 8);

        let one = &bound[1];
        assert_eq!(one.service.capacity(), 3);
        assert_eq!(one.service.now(), Instant::from_micros(5_000));
        assert_eq!(one.service.resolution(), Duration::from_millis(1));
        assert_eq!(one.max_step, Some(Duration::from_millis(20)));
        assert!(one.manual.is_some());
        assert!(bound[2].manual.is_none());
    }

    #[test]
    fn from_config_without_clock_zero_uses_defaults() {
        let mgr = load("clocks:\n  3: {}\n");
        let (ctx, bound) = SchedulingContext::from_config(&mgr).unwrap();
        assert_eq!(ctx.service(0).unwrap().capacity(), DEFAULT_CAPACITY);
        assert_eq!(bound.len(), 2);
        assert!(bound[1].manual.is_some(), "manual is the default kind");
    }
}
