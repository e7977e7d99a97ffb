/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Infra-timer – cooperative single-threaded timers over pluggable clocks
//!
//! Timers are armed against a numbered clock and fire when that clock's
//! [`TimerService`] is advanced by an external driver.  Nothing in this crate
//! spawns threads or sleeps.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── time/      – signed nanosecond Instant / Duration, packed storage form
//! ├── clock.rs   – Clock trait, SystemClock, ManualClock
//! ├── service/   – per-clock TimerService: ordered registry + dispatch
//! ├── timer/     – Timer, TimerSingleShot, TimerRepeating, JumpPolicy
//! ├── context.rs – SchedulingContext: clock id → service registry
//! ├── driver.rs  – ClockDriver: jump detection + advance
//! └── config/    – YAML clock configuration
//! ```
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use infra_timer::{action, Duration, Instant, ManualClock, SchedulingContext, TimerSingleShot};
//!
//! let clock = Rc::new(ManualClock::new(Instant::EPOCH));
//! let mut ctx = SchedulingContext::new();
//! let service = ctx.bind(1, clock.clone(), 16)?;
//!
//! let fired = Rc::new(Cell::new(false));
//! let f = fired.clone();
//! let _timer = TimerSingleShot::new_after(&ctx, 1, Duration::from_millis(5), action(move || f.set(true)))?;
//!
//! clock.advance_by(Duration::from_millis(5));
//! service.tick();
//! assert!(fired.get());
//! # Ok::<(), infra_timer::TimerError>(())
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod driver;
pub mod service;
pub mod time;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClockConfig, ClockConfigManager, ClockKind};
pub use context::{BoundClock, SchedulingContext, DEFAULT_CAPACITY};
pub use driver::{ClockDriver, PollOutcome};
pub use service::{ClockId, TimerError, TimerService, SYSTEM_CLOCK_ID};
pub use time::{Duration, Instant, PackedInstant};
pub use timer::{action, Action, JumpPolicy, Timer, TimerRepeating, TimerSingleShot};
