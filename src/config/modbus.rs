// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server configuration

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP server.
///
/// # Example
///
/// ```
/// use modbus_point_simulator::config::{IdentityConfig, ModbusConfig};
///
/// let modbus_config = ModbusConfig {
///     port: 502,
///     address: "0.0.0.0".to_string(),
///     register_count: 200,
///     allow_writes: false,
///     identity: IdentityConfig::default(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// The TCP port the Modbus server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 5020, so that the simulator
    /// can run without privileges next to a real device on 502.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the Modbus server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or `localhost`. Default is "localhost".
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_address")]
    pub address: String,

    /// Minimum number of registers the device exposes.
    ///
    /// The store grows beyond this when a point is configured past it.
    #[serde(default = "default_register_count")]
    pub register_count: usize,

    /// Honour write requests from clients.
    ///
    /// Written values stay visible until the next tick overwrites them.
    #[serde(default = "default_allow_writes")]
    pub allow_writes: bool,

    /// Identification reported to clients (function codes 17 and 43/14).
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Device identification objects published by the server.
///
/// Served by Report Server ID (0x11) and by Read Device Identification
/// (0x2B / MEI 0x0E), objects 0x00 to 0x05.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Server id byte of the Report Server ID response.
    #[serde(default = "default_server_id")]
    pub server_id: u8,
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,
    #[serde(default = "default_product_code")]
    pub product_code: String,
    #[serde(default = "default_major_minor_revision")]
    pub major_minor_revision: String,
    #[serde(default = "default_vendor_url")]
    pub vendor_url: String,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_server_id() -> u8 {
    1
}

fn default_vendor_name() -> String {
    "DataCenter Inc.".to_string()
}

fn default_product_code() -> String {
    "MODBUS-POINT-SIM".to_string()
}

fn default_major_minor_revision() -> String {
    "1.0".to_string()
}

fn default_vendor_url() -> String {
    "http://www.datacenter.inc/".to_string()
}

fn default_product_name() -> String {
    "Modbus Point Simulator".to_string()
}

fn default_model_name() -> String {
    "MODBUS-SIMU-01".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            vendor_name: default_vendor_name(),
            product_code: default_product_code(),
            major_minor_revision: default_major_minor_revision(),
            vendor_url: default_vendor_url(),
            product_name: default_product_name(),
            model_name: default_model_name(),
        }
    }
}

fn default_port() -> u16 {
    5020
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_register_count() -> usize {
    1000
}

fn default_allow_writes() -> bool {
    true
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            register_count: default_register_count(),
            allow_writes: default_allow_writes(),
            identity: IdentityConfig::default(),
        }
    }
}

impl ModbusConfig {
    /// `address:port` string handed to the listener.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}
