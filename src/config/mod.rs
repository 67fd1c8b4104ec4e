// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the Modbus point simulator
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the simulator. The configuration is backed by a
//! YAML file and validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `modbus`: Settings for the Modbus TCP server
//! - `simulation`: Settings for the periodic value generation
//! - `points`: The point table served by the file-backed catalog
//! - `settings`: Key/value settings persisted by the file-backed catalog
//!
//! ## Usage
//!
//! ```no_run
//! use modbus_point_simulator::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(1502),                  // Modbus port
//!     None,                        // Seed
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod modbus;
pub mod simulation;
pub mod utils;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::simulation::{DataType, PointDefinition};

pub use modbus::{IdentityConfig, ModbusConfig};
pub use simulation::SimulationConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure for the simulator.
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, so an empty file describes the default device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Modbus TCP server settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Scheduler settings.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Points of the simulated device.
    ///
    /// Only read through [`crate::catalog::FileCatalog`], so that edits are
    /// picked up on reload.
    #[serde(default = "default_points")]
    pub points: Vec<PointDefinition>,

    /// Persisted key/value settings, such as `modbus_update_interval`.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modbus: ModbusConfig::default(),
            simulation: SimulationConfig::default(),
            points: default_points(),
            settings: BTreeMap::new(),
        }
    }
}

/// The five host metrics every new device starts with.
pub fn default_points() -> Vec<PointDefinition> {
    vec![
        PointDefinition::new(1, "CPU usage", 0, DataType::Float, 0.0, 100.0)
            .with_unit("%")
            .with_description("CPU usage percentage"),
        PointDefinition::new(2, "Memory usage", 2, DataType::Float, 0.0, 100.0)
            .with_unit("%")
            .with_description("Memory usage percentage"),
        PointDefinition::new(3, "Disk usage", 4, DataType::Float, 0.0, 100.0)
            .with_unit("%")
            .with_description("Disk usage percentage"),
        PointDefinition::new(4, "Network traffic", 6, DataType::Float, 0.0, 1000.0)
            .with_unit("Mbps")
            .with_description("Network throughput"),
        PointDefinition::new(5, "Device temperature", 8, DataType::Float, 30.0, 70.0)
            .with_unit("°C")
            .with_description("Device temperature"),
    ]
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Config path: {:?}, sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. A file that
    /// fails validation leaves a `.sample.yaml` next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // An empty document is the default configuration
        let yaml_value: serde_yml::Value = if contents.trim().is_empty() {
            serde_yml::Value::Null
        } else {
            serde_yml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?
        };
        let yaml_value = match yaml_value {
            serde_yml::Value::Null => serde_yml::Value::Mapping(Default::default()),
            other => other,
        };

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema: serde_json::Value = serde_json::from_str(utils::CONFIG_SCHEMA)
            .context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_value(yaml_value) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {:#}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// # Parameters
    ///
    /// * `modbus_address` - Network address for the Modbus server to bind to
    /// * `modbus_port` - TCP port for the Modbus server
    /// * `seed` - Seed for reproducible value sequences
    pub fn apply_args(
        &mut self,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        seed: Option<u64>,
    ) {
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(seed) = seed {
            debug!("Overriding simulation seed from command line: {}", seed);
            self.simulation.seed = Some(seed);
        }
    }
}
