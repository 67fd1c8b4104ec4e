// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module exposes the simulated device over Modbus TCP, allowing
//! external systems to read the values generated for each point.
//!
//! ## Key Components
//!
//! - [`RegisterStore`]: the word array shared by the scheduler and the server.
//! - [`codec`]: conversion between point values and register pairs.
//! - [`SimulatorModbusServer`]: the `tokio-modbus` service answering requests
//!   against the store.
//! - [`identification`]: device identification objects reported to clients.
//!
//! ## Register Map
//!
//! Each point occupies two consecutive registers starting at its address,
//! low word first. `float` points are scaled by 100:
//!
//! | Address | Content                              |
//! |---------|--------------------------------------|
//! | `n`     | low 16 bits of the signed 32-bit raw |
//! | `n + 1` | high 16 bits of the signed 32-bit raw |
//!
//! Function codes 1 to 6, 15, 16, 22 and 23 are served from the store,
//! 17 and 43/14 from the device identity. Holding and input registers alias
//! the same store; coils and discrete inputs read a word as `true` when it is
//! non-zero.

pub mod codec;
pub mod identification;
pub mod modbus_server;
pub mod register_store;

pub use identification::DeviceIdentification;
pub use modbus_server::{serve, SimulatorModbusServer};
pub use register_store::RegisterStore;
