// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types shared by the simulator components
//!
//! Each layer has its own error enum so callers can match on the failure
//! that concerns them. Collaborator and configuration code uses `anyhow`
//! and is wrapped into [`DaemonError::Catalog`] at the lifecycle boundary.

use thiserror::Error;

use crate::daemon::DaemonState;
use crate::simulation::point::{PointId, PointValue};

/// Failures converting a point value into a pair of 16-bit registers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("value {value} does not fit in a signed 32-bit register pair")]
    OutOfRange { value: PointValue },

    #[error("value {value} is not a finite number")]
    NotFinite { value: f64 },
}

/// Validation failures rejecting a whole registry generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("point {id} has inverted bounds: min {min} > max {max}")]
    InvertedBounds { id: PointId, min: f64, max: f64 },

    #[error("point {id} has non-finite bounds")]
    NonFiniteBounds { id: PointId },

    #[error("point id {id} is defined more than once")]
    DuplicateId { id: PointId },

    #[error("point {id} at address {address} overlaps point {other} at address {other_address}")]
    AddressOverlap {
        id: PointId,
        address: u16,
        other: PointId,
        other_address: u16,
    },

    #[error("point {id} at address {address} needs two registers but the address space ends at 65535")]
    AddressOutOfRange { id: PointId, address: u16 },
}

/// Failure producing a new value for one point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("point {id} has no representable {kind} value within [{min}, {max}]")]
    EmptyRange {
        id: PointId,
        kind: &'static str,
        min: f64,
        max: f64,
    },
}

/// Per-point failure during a simulation tick. Never aborts the tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("point {id}: {source}")]
    Encoding {
        id: PointId,
        #[source]
        source: CodecError,
    },
}

/// Errors surfaced by the daemon control operations.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("cannot {operation} while the simulator is {state}")]
    InvalidState {
        operation: &'static str,
        state: DaemonState,
    },

    #[error("update interval must be a finite number of seconds greater than zero, got {0}")]
    InvalidInterval(f64),

    #[error("point catalog failure: {0:#}")]
    Catalog(anyhow::Error),

    #[error("invalid point configuration: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to bind Modbus listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}
