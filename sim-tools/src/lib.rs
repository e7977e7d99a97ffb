/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario simulator for `infra-timer`.
//!
//! ```text
//! lib.rs
//! ├── scenario.rs – YAML list of timers to arm
//! └── sim.rs      – binds clocks, arms timers, drives virtual or real time
//! ```

pub mod scenario;
pub mod sim;
