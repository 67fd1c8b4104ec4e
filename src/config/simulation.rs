// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulation scheduler configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::simulation::DEFAULT_UPDATE_INTERVAL;

/// Settings of the periodic value generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds between two ticks when the catalog holds no interval setting.
    #[serde(default = "default_update_interval")]
    pub update_interval: f64,

    /// How long a stop waits for the scheduler and the listener, in milliseconds.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Seed for reproducible value sequences. Random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_update_interval() -> f64 {
    DEFAULT_UPDATE_INTERVAL
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            stop_timeout_ms: default_stop_timeout_ms(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
