// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::debug;

use super::DeviceCatalog;
use crate::config::Config;
use crate::simulation::PointDefinition;
use crate::utility;

/// Catalog backed by the YAML configuration file.
///
/// The file is read on every call so that edits are visible to the next
/// reload. Writes rewrite the whole file.
#[derive(Debug)]
pub struct FileCatalog {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    guard: Mutex<()>,
}

impl FileCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Config> {
        Config::from_file(&self.path)
            .with_context(|| format!("Failed to read catalog from {}", self.path.display()))
    }
}

impl DeviceCatalog for FileCatalog {
    fn list_active_points(&self) -> Result<Vec<PointDefinition>> {
        let _guard = utility::lock(&self.guard);
        Ok(self.load()?.points)
    }

    fn get_config(&self, key: &str) -> Result<Option<String>> {
        let _guard = utility::lock(&self.guard);
        Ok(self.load()?.settings.get(key).cloned())
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let _guard = utility::lock(&self.guard);
        let mut config = self.load()?;
        config.settings.insert(key.to_string(), value.to_string());
        config.save_to_file(&self.path)?;
        debug!("Saved setting {}={} to {}", key, value, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UPDATE_INTERVAL_KEY;

    #[test]
    fn test_settings_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.yaml");

        let catalog = FileCatalog::new(&path);
        assert_eq!(catalog.list_active_points().unwrap().len(), 5);
        assert_eq!(catalog.get_config(UPDATE_INTERVAL_KEY).unwrap(), None);
        catalog.set_config(UPDATE_INTERVAL_KEY, "0.5").unwrap();

        let reopened = FileCatalog::new(&path);
        assert_eq!(
            reopened.get_config(UPDATE_INTERVAL_KEY).unwrap().as_deref(),
            Some("0.5")
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.yaml");
        std::fs::write(&path, "modbus:\n  port: not-a-port\n").unwrap();

        let catalog = FileCatalog::new(&path);
        assert!(catalog.list_active_points().is_err());
    }
}
