/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Timer scenario files.
//!
//! ```yaml
//! timers:
//!   - name: heartbeat
//!     clock: 1
//!     kind: repeating
//!     period_ms: 100
//!     trigger_immediately: true
//!   - name: watchdog
//!     clock: 1
//!     kind: single_shot
//!     after_ms: 750
//!     jump_policy: rebase     # optional override
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use infra_timer::{ClockId, Duration, JumpPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTimerKind {
    SingleShot,
    Repeating,
}

/// One timer to arm at the start of a simulation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioTimer {
    pub name: String,
    #[serde(default)]
    pub clock: ClockId,
    pub kind: ScenarioTimerKind,
    /// Single-shot delay from the start of the run.
    pub after_ms: Option<i64>,
    /// Repeating period.
    pub period_ms: Option<i64>,
    /// Repeating only: first firing at the start instant.
    #[serde(default)]
    pub trigger_immediately: bool,
    pub jump_policy: Option<JumpPolicy>,
}

impl ScenarioTimer {
    pub fn after(&self) -> Duration {
        Duration::from_millis(self.after_ms.unwrap_or(0))
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.unwrap_or(0))
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("timer name must not be empty");
        }
        match self.kind {
            ScenarioTimerKind::SingleShot => {
                let Some(after) = self.after_ms else {
                    bail!("single_shot timer `{}` needs after_ms", self.name);
                };
                if after < 0 {
                    bail!("timer `{}`: after_ms must not be negative", self.name);
                }
                if self.period_ms.is_some() || self.trigger_immediately {
                    bail!(
                        "timer `{}`: period_ms and trigger_immediately apply to repeating timers only",
                        self.name
                    );
                }
            }
            ScenarioTimerKind::Repeating => {
                match self.period_ms {
                    Some(p) if p > 0 => {}
                    Some(p) => bail!("timer `{}`: period_ms must be positive, got {p}", self.name),
                    None => bail!("repeating timer `{}` needs period_ms", self.name),
                }
                if self.after_ms.is_some() {
                    bail!("timer `{}`: after_ms applies to single_shot timers only", self.name);
                }
            }
        }
        Ok(())
    }
}

/// A parsed and validated scenario.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub timers: Vec<ScenarioTimer>,
}

impl Scenario {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let scenario: Scenario =
            serde_yaml::from_str(content).context("Failed to parse scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid scenario: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for timer in &self.timers {
            timer.validate()?;
            if !names.insert(timer.name.as_str()) {
                bail!("duplicate timer name `{}`", timer.name);
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_both_kinds() {
        let s = Scenario::from_yaml(
            r#"
timers:
  - name: heartbeat
    clock: 1
    kind: repeating
    period_ms: 100
    trigger_immediately: true
  - name: watchdog
    kind: single_shot
    after_ms: 750
    jump_policy: rebase
"#,
        )
        .unwrap();

        assert_eq!(s.timers.len(), 2);
        let hb = &s.timers[0];
        assert_eq!(hb.kind, ScenarioTimerKind::Repeating);
        assert_eq!(hb.period(), Duration::from_millis(100));
        assert!(hb.trigger_immediately);
        assert_eq!(hb.jump_policy, None);

        let wd = &s.timers[1];
        assert_eq!(wd.clock, 0, "clock defaults to the system clock");
        assert_eq!(wd.after(), Duration::from_millis(750));
        assert_eq!(wd.jump_policy, Some(JumpPolicy::Rebase));
    }

    #[test]
    fn empty_scenario_is_valid() {
        assert!(Scenario::from_yaml("{}").unwrap().timers.is_empty());
    }

    #[test]
    fn rejects_inconsistent_timers() {
        for yaml in [
            "timers:\n  - {name: a, kind: single_shot}\n",
            "timers:\n  - {name: a, kind: single_shot, after_ms: -1}\n",
            "timers:\n  - {name: a, kind: single_shot, after_ms: 1, period_ms: 5}\n",
            "timers:\n  - {name: a, kind: repeating}\n",
            "timers:\n  - {name: a, kind: repeating, period_ms: 0}\n",
            "timers:\n  - {name: a, kind: repeating, period_ms: 5, after_ms: 1}\n",
            "timers:\n  - {name: '', kind: repeating, period_ms: 5}\n",
            "timers:\n  - {name: a, kind: periodic, period_ms: 5}\n",
            "timers:\n  - {name: a, kind: repeating, period_ms: 5}\n  - {name: a, kind: repeating, period_ms: 7}\n",
        ] {
            assert!(Scenario::from_yaml(yaml).is_err(), "accepted: {yaml}");
        }
    }

    #[test]
    fn load_reads_from_disk() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"timers:\n  - {name: t, kind: single_shot, after_ms: 5}\n")
            .unwrap();
        let s = Scenario::load(f.path()).unwrap();
        assert_eq!(s.timers[0].name, "t");

        assert!(Scenario::load(Path::new("/nonexistent/scenario.yaml")).is_err());
    }
}
