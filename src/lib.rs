// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus point simulator library
//!
//! This library simulates an industrial Modbus TCP device: a set of
//! measurement points whose values are regenerated periodically within their
//! bounds and served as pairs of 16-bit registers.

pub mod catalog;
pub mod config;
pub mod daemon;
pub mod error;
pub mod modbus;
pub mod simulation;
pub mod utility;

pub use error::{CodecError, DaemonError, GenerationError, RegistryError, SimulationError};
