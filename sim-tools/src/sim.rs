/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Runs a [`Scenario`] against the clocks of a [`ClockConfigManager`].
//!
//! Two modes share the same per-step work (move manual clocks, inject the
//! optional jump, poll every [`ClockDriver`]):
//!
//! * **virtual** – manual clocks advance by exactly `tick` per step, as fast
//!   as the loop runs.  Manual clocks without a configured `max_step` get
//!   `2 * tick` so an injected forward jump is detected.
//! * **realtime** – a `tokio` interval paces the loop and manual clocks
//!   advance by the real time elapsed between ticks.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use infra_timer::{
    action, BoundClock, ClockConfigManager, ClockDriver, ClockId, Duration, Instant,
    SchedulingContext, TimerRepeating, TimerSingleShot,
};

use crate::scenario::{Scenario, ScenarioTimer, ScenarioTimerKind};

/// One recorded action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub timer: String,
    pub clock: ClockId,
    /// Reading of the timer's clock when the action ran.
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Total simulated (or real) time to run for.
    pub run: Duration,
    pub tick: Duration,
    /// Elapsed time after which the jump is injected into manual clocks.
    pub jump_at: Option<Duration>,
    /// Signed size of the injected jump.
    pub jump_by: Duration,
}

impl RunOptions {
    fn validate(&self) -> Result<()> {
        if self.tick <= Duration::ZERO {
            bail!("tick must be positive, got {}", self.tick);
        }
        if self.run.is_negative() {
            bail!("run time must not be negative, got {}", self.run);
        }
        Ok(())
    }
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub polls: usize,
    pub fired: usize,
    /// Polls classified as clock jumps, across all clocks.
    pub jumps: usize,
    /// Firings per timer name, including timers that never fired.
    pub per_timer: BTreeMap<String, usize>,
    /// Timers still armed when the run ended.
    pub still_armed: Vec<String>,
}

impl Summary {
    pub fn log(&self) {
        info!(
            polls = self.polls,
            fired = self.fired,
            jumps = self.jumps,
            "Simulation finished"
        );
        for (name, count) in &self.per_timer {
            info!("  [{name}]  fired={count}");
        }
        for name in &self.still_armed {
            debug!("  [{name}]  still armed");
        }
    }

    fn record_poll(&mut self, fired: usize, jumped: bool) {
        self.polls += 1;
        self.fired += fired;
        if jumped {
            self.jumps += 1;
        }
    }
}

enum ArmedTimer {
    SingleShot(TimerSingleShot),
    Repeating(TimerRepeating),
}

impl ArmedTimer {
    fn armed(&self) -> bool {
        match self {
            ArmedTimer::SingleShot(t) => t.armed(),
            ArmedTimer::Repeating(t) => t.armed(),
        }
    }
}

/// A bound set of clocks with the scenario's timers armed on them.
pub struct Simulation {
    // Declared first so timers release their slots before the services go.
    timers: Vec<(String, ArmedTimer)>,
    clocks: Vec<BoundClock>,
    context: SchedulingContext,
    firings: Rc<RefCell<Vec<Firing>>>,
}

impl Simulation {
    /// Binds every configured clock and arms every scenario timer relative
    /// to its clock's current reading.
    pub fn new(config: &ClockConfigManager, scenario: &Scenario) -> Result<Self> {
        let (context, clocks) =
            SchedulingContext::from_config(config).context("Failed to bind configured clocks")?;
        let firings = Rc::new(RefCell::new(Vec::new()));

        let mut timers = Vec::with_capacity(scenario.timers.len());
        for entry in &scenario.timers {
            let timer = arm(&context, entry, &firings)
                .with_context(|| format!("Cannot arm timer `{}`", entry.name))?;
            timers.push((entry.name.clone(), timer));
        }

        info!(
            clocks = clocks.len(),
            timers = timers.len(),
            "Simulation ready"
        );
        Ok(Self {
            timers,
            clocks,
            context,
            firings,
        })
    }

    pub fn context(&self) -> &SchedulingContext {
        &self.context
    }

    /// Every firing so far, in dispatch order.
    pub fn firings(&self) -> Vec<Firing> {
        self.firings.borrow().clone()
    }

    /// Steps manual clocks by `opts.tick` until `opts.run` has elapsed.
    pub fn run_virtual(&mut self, opts: &RunOptions) -> Result<Summary> {
        opts.validate()?;
        info!(run = %opts.run, tick = %opts.tick, "Running in virtual time");

        let mut drivers: Vec<ClockDriver> = self
            .clocks
            .iter()
            .map(|c| {
                let max_step = match c.manual {
                    Some(_) => c.max_step.or(Some(opts.tick * 2)),
                    None => c.max_step,
                };
                ClockDriver::new(c.service.clone(), max_step)
            })
            .collect();

        let mut summary = Summary::default();
        let mut jump_pending = opts.jump_at;
        let mut elapsed = Duration::ZERO;

        while elapsed < opts.run {
            let step = opts.tick.min(opts.run - elapsed);
            self.advance_manual(step);
            elapsed += step;
            poll_all(&mut drivers, &mut summary);

            if jump_pending.is_some_and(|at| elapsed >= at) {
                jump_pending = None;
                self.inject_jump(elapsed, opts.jump_by, &mut drivers, &mut summary);
            }
        }

        Ok(self.finish(summary))
    }

    /// Polls on a `tokio` interval of `opts.tick` until `opts.run` of real
    /// time has passed.
    pub async fn run_realtime(&mut self, opts: &RunOptions) -> Result<Summary> {
        opts.validate()?;
        info!(run = %opts.run, tick = %opts.tick, "Running in real time");

        let mut drivers: Vec<ClockDriver> = self.clocks.iter().map(BoundClock::driver).collect();
        let mut interval = tokio::time::interval(opts.tick.to_std());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = Summary::default();
        let mut jump_pending = opts.jump_at;
        let start = tokio::time::Instant::now();
        let mut last = start;

        loop {
            interval.tick().await;
            let now = tokio::time::Instant::now();
            self.advance_manual(Duration::from_std(now - last));
            last = now;
            poll_all(&mut drivers, &mut summary);

            let elapsed = Duration::from_std(now - start);
            if jump_pending.is_some_and(|at| elapsed >= at) {
                jump_pending = None;
                self.inject_jump(elapsed, opts.jump_by, &mut drivers, &mut summary);
            }
            if elapsed >= opts.run {
                break;
            }
        }

        Ok(self.finish(summary))
    }

    fn advance_manual(&self, by: Duration) {
        for clock in &self.clocks {
            if let Some(manual) = &clock.manual {
                manual.advance_by(by);
            }
        }
    }

    fn inject_jump(
        &self,
        elapsed: Duration,
        by: Duration,
        drivers: &mut [ClockDriver],
        summary: &mut Summary,
    ) {
        warn!(at = %elapsed, by = %by, "Injecting clock jump into manual clocks");
        self.advance_manual(by);
        poll_all(drivers, summary);
    }

    fn finish(&self, mut summary: Summary) -> Summary {
        for (name, timer) in &self.timers {
            summary.per_timer.insert(name.clone(), 0);
            if timer.armed() {
                summary.still_armed.push(name.clone());
            }
        }
        for firing in self.firings.borrow().iter() {
            *summary.per_timer.entry(firing.timer.clone()).or_default() += 1;
        }
        summary
    }
}

fn poll_all(drivers: &mut [ClockDriver], summary: &mut Summary) {
    for driver in drivers {
        let outcome = driver.poll();
        summary.record_poll(outcome.fired, outcome.jumped_from.is_some());
    }
}

fn arm(
    context: &SchedulingContext,
    entry: &ScenarioTimer,
    firings: &Rc<RefCell<Vec<Firing>>>,
) -> Result<ArmedTimer> {
    // Weak: the action lives inside the service it reads from.
    let service = Rc::downgrade(context.service(entry.clock)?);
    let log = firings.clone();
    let name = entry.name.clone();
    let clock = entry.clock;
    let act = action(move || {
        let at = service.upgrade().map_or(Instant::EPOCH, |s| s.now());
        info!(timer = %name, clock, at = %at, "Timer fired");
        log.borrow_mut().push(Firing {
            timer: name.clone(),
            clock,
            at,
        });
    });

    let timer = match entry.kind {
        ScenarioTimerKind::SingleShot => {
            let timer = TimerSingleShot::new(context, entry.clock)?;
            if let Some(policy) = entry.jump_policy {
                timer.set_jump_policy(policy);
            }
            timer.start_after(entry.after(), act);
            ArmedTimer::SingleShot(timer)
        }
        ScenarioTimerKind::Repeating => {
            let timer = TimerRepeating::new(context, entry.clock)?;
            if let Some(policy) = entry.jump_policy {
                timer.set_jump_policy(policy);
            }
            if entry.trigger_immediately {
                timer.start_immediately(entry.period(), act);
            } else {
                timer.start(entry.period(), act);
            }
            ArmedTimer::Repeating(timer)
        }
    };
    Ok(timer)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
