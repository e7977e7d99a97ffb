/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use infra_timer::{ClockConfigManager, Duration};
use sim_tools::scenario::Scenario;
use sim_tools::sim::{RunOptions, Simulation};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Drives a timer scenario against configured clocks.
///
/// Example:
///   timer-sim --clocks clocks.yaml --scenario scenario.yaml \
///             --run-ms 2000 --tick-ms 10 --jump-at-ms 500 --jump-by-ms -300
#[derive(Debug, Parser)]
#[command(
    name = "timer-sim",
    about = "Timer scenario simulator for infra-timer",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML clock configuration file.
    #[arg(short = 'c', long = "clocks")]
    clocks: Option<PathBuf>,

    /// Path to the YAML scenario listing the timers to arm.
    #[arg(short = 's', long = "scenario")]
    scenario: PathBuf,

    /// How long to run, in milliseconds.
    #[arg(long = "run-ms", default_value_t = 1_000)]
    run_ms: i64,

    /// Poll interval, in milliseconds.
    #[arg(long = "tick-ms", default_value_t = 10)]
    tick_ms: i64,

    /// Elapsed time at which to inject a jump into every manual clock.
    #[arg(long = "jump-at-ms")]
    jump_at_ms: Option<i64>,

    /// Signed size of the injected jump, in milliseconds.
    #[arg(long = "jump-by-ms", default_value_t = 0, allow_hyphen_values = true)]
    jump_by_ms: i64,

    /// Follow the real clock instead of stepping virtual time.
    #[arg(long = "realtime", default_value_t = false)]
    realtime: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            run: Duration::from_millis(self.run_ms),
            tick: Duration::from_millis(self.tick_ms),
            jump_at: self.jump_at_ms.map(Duration::from_millis),
            jump_by: Duration::from_millis(self.jump_by_ms),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        clocks     = ?cli.clocks,
        scenario   = %cli.scenario.display(),
        run_ms     = cli.run_ms,
        tick_ms    = cli.tick_ms,
        jump_at_ms = ?cli.jump_at_ms,
        jump_by_ms = cli.jump_by_ms,
        realtime   = cli.realtime,
        "Configuration"
    );

    if let Err(e) = run(&cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    // ── Load clock configuration ──────────────────────────────────────────────
    let mut clock_config = ClockConfigManager::new();
    match &cli.clocks {
        Some(path) => clock_config.load_from_file(path)?,
        None => warn!("No clock configuration file provided, only the system clock is bound"),
    }

    // ── Arm the scenario ──────────────────────────────────────────────────────
    let scenario = Scenario::load(&cli.scenario)?;
    let mut sim = Simulation::new(&clock_config, &scenario)?;

    let opts = cli.run_options();
    let summary = if cli.realtime {
        sim.run_realtime(&opts).await?
    } else {
        sim.run_virtual(&opts)?
    };
    summary.log();
    Ok(())
}
