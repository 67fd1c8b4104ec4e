// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device catalog
//!
//! The catalog is where point definitions and persisted settings live. The
//! simulator never edits definitions; it only asks for the current list on
//! start and reload, and reads and writes the update interval setting.
//!
//! Two implementations are provided:
//!
//! - [`MemoryCatalog`]: in-process tables, for embedding and tests
//! - [`FileCatalog`]: the `points` and `settings` sections of a YAML
//!   configuration file, re-read on every call

mod file;
mod memory;

use anyhow::Result;

use crate::simulation::PointDefinition;

pub use file::FileCatalog;
pub use memory::MemoryCatalog;

/// Setting key holding the update interval in seconds.
pub const UPDATE_INTERVAL_KEY: &str = "modbus_update_interval";

/// Source of point definitions and settings for the simulator.
pub trait DeviceCatalog: Send + Sync {
    /// The points the device exposes.
    ///
    /// Entries with `is_active == false` are kept with their last value but
    /// are no longer updated.
    fn list_active_points(&self) -> Result<Vec<PointDefinition>>;

    /// Read a persisted setting. `Ok(None)` when the key is not set.
    fn get_config(&self, key: &str) -> Result<Option<String>>;

    /// Persist a setting, replacing any previous value.
    fn set_config(&self, key: &str, value: &str) -> Result<()>;
}
