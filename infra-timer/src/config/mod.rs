//! Clock configuration loading and management.
//!
//! A configuration file declares every clock a process schedules against,
//! keyed by clock id.  [`SchedulingContext::from_config`] turns a loaded
//! [`ClockConfigManager`] into bound timer services.
//!
//! The expected YAML structure is:
//! ```yaml
//! clocks:
//!   0:                    # always the platform wall clock
//!     kind: system
//!     capacity: 128
//!   1:
//!     kind: manual        # manual | system, default manual
//!     start_us: 0         # initial reading of a manual clock
//!     resolution_us: 1000 # default 1
//!     capacity: 16        # default 64
//!     max_step_us: 20000  # forward moves larger than this are jumps
//! ```
//!
//! [`SchedulingContext::from_config`]: crate::context::SchedulingContext::from_config

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::context::DEFAULT_CAPACITY;
use crate::service::{ClockId, SYSTEM_CLOCK_ID};
use crate::time::{Duration, Instant};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct ClockConfigFile {
    #[serde(default)]
    clocks: BTreeMap<ClockId, ClockConfigEntry>,
}

/// Per-clock fields as they appear in the YAML file.  All are optional.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClockConfigEntry {
    #[serde(default)]
    kind: ClockKind,
    #[serde(default)]
    start_us: i64,
    #[serde(default = "default_resolution_us")]
    resolution_us: i64,
    #[serde(default = "default_capacity")]
    capacity: usize,
    max_step_us: Option<i64>,
}

fn default_resolution_us() -> i64 {
    1
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

// ── Public data structures ────────────────────────────────────────────────────

/// Where a clock's readings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    /// A [`ManualClock`](crate::clock::ManualClock) moved by its owner.
    #[default]
    Manual,
    /// The platform wall clock.
    System,
}

/// Validated settings for one clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    pub id: ClockId,
    pub kind: ClockKind,
    /// Initial reading; only meaningful for [`ClockKind::Manual`].
    pub start: Instant,
    pub resolution: Duration,
    /// Maximum number of live timers on this clock.
    pub capacity: usize,
    /// Forward moves larger than this are treated as jumps.
    pub max_step: Option<Duration>,
}

impl ClockConfig {
    /// Settings used for clock 0 when the file does not mention it.
    pub fn system_default() -> Self {
        Self {
            id: SYSTEM_CLOCK_ID,
            kind: ClockKind::System,
            start: Instant::EPOCH,
            resolution: Duration::from_micros(1),
            capacity: DEFAULT_CAPACITY,
            max_step: None,
        }
    }

    fn from_entry(id: ClockId, entry: ClockConfigEntry) -> Result<Self> {
        if id == SYSTEM_CLOCK_ID && entry.kind != ClockKind::System {
            bail!("clock {id} is reserved for the system clock and must be of kind `system`");
        }
        if entry.resolution_us <= 0 {
            bail!(
                "clock {id}: resolution_us must be positive, got {}",
                entry.resolution_us
            );
        }
        if entry.capacity == 0 {
            bail!("clock {id}: capacity must be at least 1");
        }
        if let Some(step) = entry.max_step_us {
            if step <= 0 {
                bail!("clock {id}: max_step_us must be positive, got {step}");
            }
        }
        if entry.kind == ClockKind::System && entry.start_us != 0 {
            warn!("clock {id}: start_us is ignored for system clocks");
        }

        Ok(Self {
            id,
            kind: entry.kind,
            start: Instant::from_micros(entry.start_us),
            resolution: Duration::from_micros(entry.resolution_us),
            capacity: entry.capacity,
            max_step: entry.max_step_us.map(Duration::from_micros),
        })
    }
}

// ── ClockConfigManager ────────────────────────────────────────────────────────

/// Loads and manages clock configurations from a YAML file.
#[derive(Debug, Default)]
pub struct ClockConfigManager {
    /// Map of clock id → [`ClockConfig`], ordered by id.
    clocks: BTreeMap<ClockId, ClockConfig>,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl ClockConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and populates the internal clock map.
    ///
    /// Calling this method a second time replaces all previously loaded
    /// clocks.  A file without a `clocks` section is valid and yields an empty
    /// map (clock 0 then falls back to [`ClockConfig::system_default`]).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or a clock entry fails validation.  The manager is left empty
    /// and unloaded in that case.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading clock configuration from: {}", path.display());

        // Reset state before (re-)loading
        self.clocks.clear();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: ClockConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let mut clocks = BTreeMap::new();
        for (id, entry) in file.clocks {
            let clock = ClockConfig::from_entry(id, entry)
                .with_context(|| format!("Invalid clock entry in {}", path.display()))?;
            debug!(
                "  Clock: {} | Kind: {:?} | Resolution: {} | Capacity: {}",
                clock.id, clock.kind, clock.resolution, clock.capacity,
            );
            clocks.insert(id, clock);
        }

        if clocks.is_empty() {
            warn!("No clocks found in configuration file, only the system clock will be bound");
        }

        self.clocks = clocks;
        self.loaded = true;

        info!(
            "Successfully loaded {} clock configuration(s)",
            self.clocks.len()
        );
        Ok(())
    }

    /// Returns the [`ClockConfig`] for `id`, or `None` if the file did not
    /// declare it.
    pub fn get_clock_config(&self, id: ClockId) -> Option<&ClockConfig> {
        self.clocks.get(&id)
    }

    /// Returns every loaded clock, ordered by id.
    pub fn get_all_clocks(&self) -> &BTreeMap<ClockId, ClockConfig> {
        &self.clocks
    }

    /// Returns `true` after a successful call to [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn load(content: &str) -> Result<ClockConfigManager> {
        let f = yaml_tempfile(content);
        let mut mgr = ClockConfigManager::new();
        mgr.load_from_file(f.path())?;
        Ok(mgr)
    }

    #[test]
    fn system_default_describes_clock_zero() {
        let cfg = ClockConfig::system_default();
        assert_eq!(cfg.id, SYSTEM_CLOCK_ID);
        assert_eq!(cfg.kind, ClockKind::System);
        assert_eq!(cfg.capacity, DEFAULT_CAPACITY);
        assert_eq!(cfg.max_step, None);
    }

    #[test]
    fn load_full_yaml() {
        let mgr = load(
            r#"
clocks:
  0:
    kind: system
    capacity: 128
  1:
    kind: manual
    start_us: 2500
    resolution_us: 1000
    capacity: 16
    max_step_us: 20000
  4:
    kind: system
    resolution_us: 100
"#,
        )
        .unwrap();

        assert!(mgr.is_loaded());
        assert_eq!(mgr.get_all_clocks().keys().copied().collect::<Vec<_>>(), vec![0, 1, 4]);

        assert_eq!(mgr.get_clock_config(0).unwrap().capacity, 128);

        let one = mgr.get_clock_config(1).unwrap();
        assert_eq!(one.kind, ClockKind::Manual);
        assert_eq!(one.start, Instant::from_micros(2_500));
        assert_eq!(one.resolution, Duration::from_millis(1));
        assert_eq!(one.capacity, 16);
        assert_eq!(one.max_step, Some(Duration::from_millis(20)));

        let four = mgr.get_clock_config(4).unwrap();
        assert_eq!(four.kind, ClockKind::System);
        assert_eq!(four.resolution, Duration::from_micros(100));
    }

    #[test]
    fn optional_fields_use_defaults_when_absent() {
        let mgr = load("clocks:\n  2: {}\n").unwrap();
        let cfg = mgr.get_clock_config(2).unwrap();
        assert_eq!(cfg.kind, ClockKind::Manual);
        assert_eq!(cfg.start, Instant::EPOCH);
        assert_eq!(cfg.resolution, Duration::from_micros(1));
        assert_eq!(cfg.capacity, DEFAULT_CAPACITY);
        assert_eq!(cfg.max_step, None);
    }

    #[test]
    fn missing_clocks_section_is_empty_but_loaded() {
        let mgr = load("{}\n").unwrap();
        assert!(mgr.is_loaded());
        assert!(mgr.get_all_clocks().is_empty());
    }

    #[test]
    fn manual_clock_zero_is_rejected() {
        let err = load("clocks:\n  0:\n    kind: manual\n").unwrap_err();
        assert!(format!("{err:#}").contains("reserved for the system clock"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "clocks:\n  1:\n    resolution_us: 0\n",
            "clocks:\n  1:\n    capacity: 0\n",
            "clocks:\n  1:\n    max_step_us: -5\n",
            "clocks:\n  1:\n    kind: atomic\n",
            "clocks:\n  1:\n    period_us: 5\n",
        ] {
            assert!(load(yaml).is_err(), "accepted: {yaml}");
        }
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = ClockConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/clocks.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        let mut mgr = ClockConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn reload_replaces_previous_clocks() {
        let f1 = yaml_tempfile("clocks:\n  1: {}\n");
        let f2 = yaml_tempfile("clocks:\n  2: {}\n");

        let mut mgr = ClockConfigManager::new();
        mgr.load_from_file(f1.path()).unwrap();
        assert!(mgr.get_clock_config(1).is_some());

        mgr.load_from_file(f2.path()).unwrap();
        assert!(mgr.get_clock_config(1).is_none(), "old clock must be gone");
        assert!(mgr.get_clock_config(2).is_some());
    }

    #[test]
    fn failed_reload_clears_previous_clocks() {
        let good = yaml_tempfile("clocks:\n  1: {}\n");
        let bad = yaml_tempfile("clocks:\n  1:\n    capacity: 0\n");

        let mut mgr = ClockConfigManager::new();
        mgr.load_from_file(good.path()).unwrap();
        assert!(mgr.load_from_file(bad.path()).is_err());
        assert!(!mgr.is_loaded());
        assert!(mgr.get_all_clocks().is_empty());
    }
}
