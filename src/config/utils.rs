// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::Config;
use crate::simulation::registry::validate_points;
use crate::simulation::scheduler::is_valid_interval;

/// JSON schema of the configuration file, embedded at build time.
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./modbus_point_simulator --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port Range**: the Modbus port is within 1-65534
/// - **IP Address Format**: a warning is logged for addresses that are not an IP or `localhost`
/// - **Update Interval**: finite and greater than zero
/// - **Points**: the point table would be accepted by the registry (unique ids,
///   ordered finite bounds, no overlapping active points)
/// - **Settings**: a stored `modbus_update_interval` parses as a valid interval
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid port number: {}", config.modbus.port);
    }

    if !is_valid_ip_address(&config.modbus.address) {
        warn!(
            "Potentially invalid address format: {}",
            config.modbus.address
        );
    }

    if !is_valid_interval(config.simulation.update_interval) {
        anyhow::bail!(
            "Invalid update interval: {} (must be greater than zero)",
            config.simulation.update_interval
        );
    }

    validate_points(&config.points).context("Invalid point table")?;

    if let Some(raw) = config.settings.get(crate::catalog::UPDATE_INTERVAL_KEY) {
        match raw.trim().parse::<f64>() {
            Ok(v) if is_valid_interval(v) => {}
            _ => anyhow::bail!(
                "Invalid {} setting: {:?}",
                crate::catalog::UPDATE_INTERVAL_KEY,
                raw
            ),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{DataType, PointDefinition};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_ip_address_validation() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("not an address"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.modbus.port = 65535;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.simulation.update_interval = 0.0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config
            .points
            .push(PointDefinition::new(9, "overlap", 1, DataType::Int, 0.0, 1.0));
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.settings.insert(
            crate::catalog::UPDATE_INTERVAL_KEY.to_string(),
            "fast".to_string(),
        );
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_schema_is_valid_json() {
        let schema: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA).unwrap();
        assert!(schema.get("properties").is_some());
    }
}
