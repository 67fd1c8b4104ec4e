// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module coordinates the background services of the simulator:
//! the simulation scheduler and the Modbus TCP listener.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped --start--> Starting --> Running --stop--> Stopping --> Stopped
//!                       |
//!                       +--(catalog or validation failure)--> Stopped
//! ```
//!
//! `reload` is only accepted while `Running`; `set_interval` and `stop` are
//! accepted in any state.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use modbus_point_simulator::{catalog::FileCatalog, config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let catalog = Arc::new(FileCatalog::new("config.yaml"));
//!
//!     let mut daemon = Daemon::new(config, catalog)?;
//!     daemon.start().await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.stop().await;
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;

use std::fmt;

use serde::Serialize;

pub use launch_daemon::{Daemon, DaemonStatus};

/// Lifecycle state of a [`Daemon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DaemonState::Stopped => "stopped",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
