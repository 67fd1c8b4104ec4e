// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};

use super::DeviceCatalog;
use crate::simulation::{PointDefinition, PointId};
use crate::utility;

/// In-memory catalog.
///
/// Can be switched to an unavailable state where every call fails, to
/// exercise the simulator against an unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    points: RwLock<Vec<PointDefinition>>,
    settings: RwLock<BTreeMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryCatalog {
    pub fn new(points: Vec<PointDefinition>) -> Self {
        Self {
            points: RwLock::new(points),
            ..Self::default()
        }
    }

    pub fn with_setting(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        utility::write(&self.settings).insert(key.into(), value.into());
        self
    }

    /// Replace the whole point table.
    pub fn replace_points(&self, points: Vec<PointDefinition>) {
        *utility::write(&self.points) = points;
    }

    /// Toggle `is_active` on one point. Returns `false` if the id is unknown.
    pub fn set_point_active(&self, id: PointId, active: bool) -> bool {
        let mut points = utility::write(&self.points);
        match points.iter_mut().find(|p| p.id == id) {
            Some(point) => {
                point.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("catalog backend is unavailable");
        }
        Ok(())
    }
}

impl DeviceCatalog for MemoryCatalog {
    fn list_active_points(&self) -> Result<Vec<PointDefinition>> {
        self.check_available()?;
        Ok(utility::read(&self.points).clone())
    }

    fn get_config(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(utility::read(&self.settings).get(key).cloned())
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        utility::write(&self.settings).insert(key.to_string(), value.to_string());
        Ok(())
    }
}
