// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Random value generation for active points
//!
//! Values are drawn uniformly over a point's `[min_value, max_value]` range:
//! an integer draw for `int` points, a draw rounded to two decimals for
//! `float` points. The randomness comes from a [`ValueSource`], so tests can
//! substitute a scripted source or a seeded one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::GenerationError;
use crate::simulation::point::{DataType, PointDefinition, PointValue};
use crate::utility::round2;

/// Source of uniform draws used by the [`ValueGenerator`].
pub trait ValueSource: Send {
    /// Uniform integer in `low..=high`. Called only with `low <= high`.
    fn sample_int(&mut self, low: i64, high: i64) -> i64;

    /// Uniform float in `low..=high`. Called only with `low <= high`.
    fn sample_float(&mut self, low: f64, high: f64) -> f64;
}

/// [`ValueSource`] backed by a seedable `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    /// Seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ValueSource for RandomSource {
    fn sample_int(&mut self, low: i64, high: i64) -> i64 {
        self.rng.random_range(low..=high)
    }

    fn sample_float(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.random_range(low..=high)
    }
}

/// Produces new in-range values for points.
pub struct ValueGenerator {
    source: Box<dyn ValueSource>,
}

impl std::fmt::Debug for ValueGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGenerator").finish_non_exhaustive()
    }
}

impl Default for ValueGenerator {
    fn default() -> Self {
        Self::new(RandomSource::from_os_rng())
    }
}

impl ValueGenerator {
    pub fn new(source: impl ValueSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Seeded generator when a seed is given, OS-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(RandomSource::seeded(seed)),
            None => Self::default(),
        }
    }

    /// Draw a new value for `point`.
    ///
    /// The result always lies within `[min_value, max_value]`. Fails when the
    /// bounds contain no integer (for `int`) or no two-decimal value
    /// (for `float`).
    pub fn generate(&mut self, point: &PointDefinition) -> Result<PointValue, GenerationError> {
        match point.data_type {
            DataType::Int => {
                let low = point.min_value.ceil();
                let high = point.max_value.floor();
                if low > high {
                    return Err(empty_range(point, "integer"));
                }
                let value = self.source.sample_int(low as i64, high as i64);
                Ok(PointValue::Int(value.clamp(low as i64, high as i64)))
            }
            DataType::Float => {
                // Tightest two-decimal bounds inside the range, so that
                // rounding the draw cannot leave it.
                let low = (point.min_value * 100.0).ceil() / 100.0;
                let high = (point.max_value * 100.0).floor() / 100.0;
                if low > high {
                    return Err(empty_range(point, "two-decimal"));
                }
                let value = round2(self.source.sample_float(low, high));
                Ok(PointValue::Float(value.clamp(low, high)))
            }
        }
    }
}

fn empty_range(point: &PointDefinition, kind: &'static str) -> GenerationError {
    GenerationError::EmptyRange {
        id: point.id,
        kind,
        min: point.min_value,
        max: point.max_value,
    }
}
