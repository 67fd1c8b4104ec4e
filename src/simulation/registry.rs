// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Point registry
//!
//! The registry owns the current *generation* of points: the full set handed
//! over by the last successful [`PointRegistry::load`]. A load validates the
//! new set first and then swaps it in as a whole, so readers see either the
//! old generation or the new one, never a mix.
//!
//! The registry also owns the register store it mirrors. Replacing a
//! generation zeroes the store in the same critical section, and tick results
//! are committed only if they were computed against the generation that is
//! still current. A tick racing a reload therefore cannot write the old
//! points' addresses back into the fresh store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use log::{debug, info};

use crate::error::RegistryError;
use crate::modbus::RegisterStore;
use crate::simulation::point::{
    Point, PointDefinition, PointId, PointReading, PointValue, REGISTERS_PER_POINT,
};
use crate::utility;

/// A stable, ordered copy of one registry generation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Generation number the points belong to
    pub generation: u64,
    /// Points ordered by address, then id
    pub points: Vec<Point>,
}

/// New value for one point, computed by a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PointUpdate {
    pub id: PointId,
    pub address: u16,
    pub value: PointValue,
    pub words: [u16; 2],
}

#[derive(Debug, Default)]
struct Generation {
    number: u64,
    points: Vec<Point>,
    index: HashMap<PointId, usize>,
}

/// The authoritative set of simulated points and their current values.
#[derive(Debug)]
pub struct PointRegistry {
    generation: RwLock<Generation>,
    store: RegisterStore,
    min_registers: usize,
}

impl PointRegistry {
    /// Create an empty registry mirroring into `store`.
    ///
    /// `min_registers` is the smallest size the store is reset to on load;
    /// it grows further when a point lies beyond it.
    pub fn new(store: RegisterStore, min_registers: usize) -> Self {
        store.reset(min_registers);
        Self {
            generation: RwLock::new(Generation::default()),
            store,
            min_registers,
        }
    }

    /// Register store kept in sync with this registry.
    pub fn store(&self) -> &RegisterStore {
        &self.store
    }

    /// Replace the whole point set.
    ///
    /// On success the register store is zeroed and sized for the new points,
    /// and the new generation number is returned. On validation failure the
    /// previous generation stays in effect untouched.
    ///
    /// Points whose id and data type already existed keep their current value;
    /// everything else about them comes from `definitions`.
    pub fn load(&self, definitions: Vec<PointDefinition>) -> Result<u64, RegistryError> {
        validate_points(&definitions)?;

        let required = definitions
            .iter()
            .map(|def| def.address as usize + REGISTERS_PER_POINT as usize)
            .max()
            .unwrap_or(0)
            .max(self.min_registers);

        let mut generation = utility::write(&self.generation);

        let mut points: Vec<Point> = definitions
            .into_iter()
            .map(|definition| {
                let mut point = Point::new(definition);
                if let Some(previous) = generation
                    .index
                    .get(&point.id())
                    .map(|&i| &generation.points[i])
                {
                    if previous.definition.data_type == point.definition.data_type {
                        point.current_value = previous.current_value;
                    }
                }
                point
            })
            .collect();
        points.sort_by_key(|p| (p.address(), p.id()));

        let index = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id(), i))
            .collect();

        let number = generation.number + 1;
        let active = points.iter().filter(|p| p.is_active()).count();
        let total = points.len();
        *generation = Generation {
            number,
            points,
            index,
        };
        self.store.reset(required);
        drop(generation);

        info!(
            "Loaded point registry generation {}: {} points ({} active), {} registers",
            number, total, active, required
        );
        Ok(number)
    }

    /// Copy of the current generation for one tick or one query.
    pub fn snapshot(&self) -> Snapshot {
        let generation = utility::read(&self.generation);
        Snapshot {
            generation: generation.number,
            points: generation.points.clone(),
        }
    }

    /// Current generation number; 0 before the first load.
    pub fn generation(&self) -> u64 {
        utility::read(&self.generation).number
    }

    pub fn get(&self, id: PointId) -> Option<Point> {
        let generation = utility::read(&self.generation);
        generation
            .index
            .get(&id)
            .map(|&i| generation.points[i].clone())
    }

    pub fn all(&self) -> Vec<Point> {
        utility::read(&self.generation).points.clone()
    }

    pub fn len(&self) -> usize {
        utility::read(&self.generation).points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        utility::read(&self.generation)
            .points
            .iter()
            .filter(|p| p.is_active())
            .count()
    }

    /// Current value and name of every point, keyed by id.
    pub fn point_values(&self) -> BTreeMap<PointId, PointReading> {
        utility::read(&self.generation)
            .points
            .iter()
            .map(|p| {
                (
                    p.id(),
                    PointReading {
                        value: p.current_value,
                        name: p.definition.name.clone(),
                    },
                )
            })
            .collect()
    }

    /// Apply the results of a tick computed against `generation`.
    ///
    /// Writes the encoded words into the store and records the new values.
    /// Returns `false`, applying nothing, if the registry has moved to another
    /// generation since the snapshot was taken.
    pub fn commit(&self, generation: u64, updates: &[PointUpdate]) -> bool {
        let mut current = utility::write(&self.generation);
        if current.number != generation {
            debug!(
                "Discarding {} updates computed for generation {} (current is {})",
                updates.len(),
                generation,
                current.number
            );
            return false;
        }

        let pairs: Vec<(u16, [u16; 2])> = updates.iter().map(|u| (u.address, u.words)).collect();
        self.store.write_pairs(&pairs);

        for update in updates {
            if let Some(&i) = current.index.get(&update.id) {
                current.points[i].current_value = update.value;
            }
        }
        true
    }
}

/// Check a point set before it may become a registry generation.
///
/// Rejects duplicate ids, non-finite or inverted bounds, points whose second
/// register would fall outside the address space, and active points whose
/// two-register spans overlap.
pub fn validate_points(definitions: &[PointDefinition]) -> Result<(), RegistryError> {
    let mut ids = HashSet::with_capacity(definitions.len());
    for def in definitions {
        if !ids.insert(def.id) {
            return Err(RegistryError::DuplicateId { id: def.id });
        }
        if !def.min_value.is_finite() || !def.max_value.is_finite() {
            return Err(RegistryError::NonFiniteBounds { id: def.id });
        }
        if def.min_value > def.max_value {
            return Err(RegistryError::InvertedBounds {
                id: def.id,
                min: def.min_value,
                max: def.max_value,
            });
        }
        if def.last_address().is_none() {
            return Err(RegistryError::AddressOutOfRange {
                id: def.id,
                address: def.address,
            });
        }
    }

    let mut active: Vec<&PointDefinition> = definitions.iter().filter(|d| d.is_active).collect();
    active.sort_by_key(|d| d.address);
    for pair in active.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if (upper.address as u32) < lower.address as u32 + REGISTERS_PER_POINT as u32 {
            return Err(RegistryError::AddressOverlap {
                id: upper.id,
                address: upper.address,
                other: lower.id,
                other_address: lower.address,
            });
        }
    }
    Ok(())
}
