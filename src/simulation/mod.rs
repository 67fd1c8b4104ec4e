// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulation engine
//!
//! This module holds everything that produces point values:
//!
//! - [`point`]: point definitions and typed values
//! - [`registry`]: the swappable set of points of the simulated device
//! - [`generator`]: random in-range values with an injectable source
//! - [`scheduler`]: the periodic task writing encoded values to the register store
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use modbus_point_simulator::modbus::RegisterStore;
//! use modbus_point_simulator::simulation::{
//!     DataType, PointDefinition, PointRegistry, SimulationScheduler, ValueGenerator,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = Arc::new(PointRegistry::new(RegisterStore::default(), 100));
//! registry.load(vec![PointDefinition::new(
//!     1, "CPU usage", 0, DataType::Float, 0.0, 100.0,
//! )])?;
//!
//! let mut scheduler = SimulationScheduler::new(registry, ValueGenerator::default(), 2.0)?;
//! scheduler.start();
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod point;
pub mod registry;
pub mod scheduler;

pub use generator::{RandomSource, ValueGenerator, ValueSource};
pub use point::{
    DataType, Point, PointDefinition, PointId, PointReading, PointValue, REGISTERS_PER_POINT,
};
pub use registry::{PointRegistry, PointUpdate, Snapshot};
pub use scheduler::{SimulationScheduler, TickReport, UpdateInterval, DEFAULT_UPDATE_INTERVAL};
