// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated measurement points
//!
//! A [`PointDefinition`] is what the catalog hands to the engine. A [`Point`]
//! is a definition plus the value the scheduler last generated for it. The
//! engine never edits definitions, only `current_value`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to a point by the catalog.
pub type PointId = u64;

/// Number of 16-bit registers each point occupies.
pub const REGISTERS_PER_POINT: u16 = 2;

/// Scalar type of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Raw signed 32-bit integer
    Int,
    /// Two-decimal fixed point value, scaled by 100 on the wire
    Float,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
        }
    }
}

/// A typed point value.
///
/// Integers are held as `i64` so that values outside the 32-bit register
/// range can be represented and rejected by the codec instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Int(i64),
    Float(f64),
}

impl PointValue {
    /// The value a point holds before its first generation.
    pub fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::Int => PointValue::Int(0),
            DataType::Float => PointValue::Float(0.0),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            PointValue::Int(_) => DataType::Int,
            PointValue::Float(_) => DataType::Float,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            PointValue::Int(v) => v as f64,
            PointValue::Float(v) => v,
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Int(v) => write!(f, "{}", v),
            PointValue::Float(v) => write!(f, "{:.2}", v),
        }
    }
}

/// Point definition as stored by the catalog.
///
/// # Example
///
/// ```yaml
/// id: 5
/// name: Device temperature
/// address: 8
/// data_type: float
/// min_value: 30.0
/// max_value: 70.0
/// unit: "°C"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDefinition {
    /// Stable identifier assigned by the catalog
    pub id: PointId,

    /// Descriptive label
    pub name: String,

    /// Base register address; the point also occupies `address + 1`
    pub address: u16,

    /// Scalar type, `float` when omitted
    #[serde(default = "default_data_type")]
    pub data_type: DataType,

    /// Inclusive lower bound of generated values
    #[serde(default)]
    pub min_value: f64,

    /// Inclusive upper bound of generated values
    #[serde(default = "default_max_value")]
    pub max_value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Inactive points are skipped by the scheduler and keep their last value
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_data_type() -> DataType {
    DataType::Float
}

fn default_max_value() -> f64 {
    100.0
}

fn default_is_active() -> bool {
    true
}

impl PointDefinition {
    /// Convenience constructor for an active point without display metadata.
    pub fn new(
        id: PointId,
        name: impl Into<String>,
        address: u16,
        data_type: DataType,
        min_value: f64,
        max_value: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            address,
            data_type,
            min_value,
            max_value,
            unit: None,
            description: None,
            is_active: true,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Last register address used by this point, if it fits in the address space.
    pub fn last_address(&self) -> Option<u16> {
        self.address.checked_add(REGISTERS_PER_POINT - 1)
    }
}

/// A point of the current registry generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    #[serde(flatten)]
    pub definition: PointDefinition,

    /// Last generated value, or the type's zero before the first generation
    pub current_value: PointValue,
}

impl Point {
    pub fn new(definition: PointDefinition) -> Self {
        let current_value = PointValue::zero(definition.data_type);
        Self {
            definition,
            current_value,
        }
    }

    pub fn id(&self) -> PointId {
        self.definition.id
    }

    pub fn address(&self) -> u16 {
        self.definition.address
    }

    pub fn is_active(&self) -> bool {
        self.definition.is_active
    }
}

/// Value and label of a point, as reported to the catalog side for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointReading {
    pub value: PointValue,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_defaults_from_yaml() {
        let yaml = "id: 3\nname: Pressure\naddress: 10\n";
        let def: PointDefinition = serde_yml::from_str(yaml).unwrap();
        assert_eq!(def.data_type, DataType::Float);
        assert_eq!(def.min_value, 0.0);
        assert_eq!(def.max_value, 100.0);
        assert!(def.is_active);
        assert!(def.unit.is_none());
    }

    #[test]
    fn test_point_starts_at_type_zero() {
        let int_point = Point::new(PointDefinition::new(1, "count", 0, DataType::Int, 0.0, 9.0));
        let float_point = Point::new(PointDefinition::new(2, "temp", 2, DataType::Float, 0.0, 9.0));
        assert_eq!(int_point.current_value, PointValue::Int(0));
        assert_eq!(float_point.current_value, PointValue::Float(0.0));
    }

    #[test]
    fn test_last_address_overflow() {
        let def = PointDefinition::new(1, "edge", u16::MAX, DataType::Int, 0.0, 1.0);
        assert_eq!(def.last_address(), None);
        let def = PointDefinition::new(1, "edge", u16::MAX - 1, DataType::Int, 0.0, 1.0);
        assert_eq!(def.last_address(), Some(u16::MAX));
    }

    #[test]
    fn test_value_serializes_as_plain_number() {
        let json = serde_json::to_string(&PointValue::Float(42.37)).unwrap();
        assert_eq!(json, "42.37");
        let json = serde_json::to_string(&PointValue::Int(-7)).unwrap();
        assert_eq!(json, "-7");
    }
}
