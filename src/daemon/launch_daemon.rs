// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use super::DaemonState;
use crate::catalog::{DeviceCatalog, UPDATE_INTERVAL_KEY};
use crate::config::Config;
use crate::error::DaemonError;
use crate::modbus::{self, DeviceIdentification, RegisterStore, SimulatorModbusServer};
use crate::simulation::registry::validate_points;
use crate::simulation::scheduler::is_valid_interval;
use crate::simulation::{
    PointDefinition, PointId, PointReading, PointRegistry, SimulationScheduler, ValueGenerator,
};

/// Snapshot of the daemon for display.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    /// Configured bind address
    pub address: String,
    /// Configured port
    pub port: u16,
    /// Address the listener is actually bound to, while running
    pub local_addr: Option<SocketAddr>,
    pub update_interval: f64,
    pub point_count: usize,
    pub active_point_count: usize,
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
}

/// Owns the simulated device: its registry, scheduler and Modbus listener.
///
/// The handle is returned to the caller, who decides how many instances run.
pub struct Daemon {
    config: Config,
    catalog: Arc<dyn DeviceCatalog>,
    registry: Arc<PointRegistry>,
    scheduler: SimulationScheduler,
    state: DaemonState,
    modbus_task: Option<JoinHandle<io::Result<()>>>,
    modbus_shutdown: Option<oneshot::Sender<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Daemon {
    /// Create a stopped daemon. Values are drawn from a generator seeded with
    /// `config.simulation.seed`, or from the OS when no seed is set.
    pub fn new(config: Config, catalog: Arc<dyn DeviceCatalog>) -> Result<Self, DaemonError> {
        let generator = ValueGenerator::from_seed(config.simulation.seed);
        Self::with_generator(config, catalog, generator)
    }

    /// Create a stopped daemon drawing values from `generator`.
    pub fn with_generator(
        config: Config,
        catalog: Arc<dyn DeviceCatalog>,
        generator: ValueGenerator,
    ) -> Result<Self, DaemonError> {
        let registry = Arc::new(PointRegistry::new(
            RegisterStore::default(),
            config.modbus.register_count,
        ));
        let scheduler = SimulationScheduler::new(
            registry.clone(),
            generator,
            config.simulation.update_interval,
        )?;

        Ok(Self {
            config,
            catalog,
            registry,
            scheduler,
            state: DaemonState::Stopped,
            modbus_task: None,
            modbus_shutdown: None,
            heartbeat_task: None,
            local_addr: None,
        })
    }

    /// Load the points, start the scheduler and open the Modbus listener.
    ///
    /// On failure nothing keeps running and the daemon is back to `Stopped`.
    pub async fn start(&mut self) -> Result<(), DaemonError> {
        if self.state != DaemonState::Stopped {
            return Err(DaemonError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        self.state = DaemonState::Starting;
        info!("Starting Modbus point simulator");

        match self.launch().await {
            Ok(()) => {
                self.state = DaemonState::Running;
                info!("Modbus point simulator running");
                Ok(())
            }
            Err(e) => {
                error!("Failed to start Modbus point simulator: {}", e);
                self.state = DaemonState::Stopped;
                Err(e)
            }
        }
    }

    async fn launch(&mut self) -> Result<(), DaemonError> {
        // Nothing is committed until the listener is bound
        let points = self.fetch_points()?;
        validate_points(&points)?;

        let bind_address = self.config.modbus.bind_address();
        info!("Starting Modbus server on {}", bind_address);
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|source| DaemonError::Bind {
                address: bind_address.clone(),
                source,
            })?;

        self.registry.load(points)?;
        let interval = self.initial_interval();
        self.scheduler.set_interval(interval)?;

        self.local_addr = listener.local_addr().ok();
        self.scheduler.start();

        let service = SimulatorModbusServer::new(
            self.registry.store().clone(),
            self.config.modbus.allow_writes,
        )
        .with_identity(DeviceIdentification::new(&self.config.modbus.identity));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.modbus_shutdown = Some(shutdown_tx);
        self.modbus_task = Some(tokio::spawn(modbus::serve(
            listener,
            service,
            async move {
                let _ = shutdown_rx.await;
            },
        )));
        Ok(())
    }

    /// Interval from the catalog setting, falling back to the configured default.
    fn initial_interval(&self) -> f64 {
        let fallback = self.config.simulation.update_interval;
        match self.catalog.get_config(UPDATE_INTERVAL_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(v) if is_valid_interval(v) => v,
                _ => {
                    warn!(
                        "Ignoring invalid {} setting {:?}, using {}s",
                        UPDATE_INTERVAL_KEY, raw, fallback
                    );
                    fallback
                }
            },
            Ok(None) => fallback,
            Err(e) => {
                warn!(
                    "Could not read {} from catalog ({:#}), using {}s",
                    UPDATE_INTERVAL_KEY, e, fallback
                );
                fallback
            }
        }
    }

    fn fetch_points(&self) -> Result<Vec<PointDefinition>, DaemonError> {
        self.catalog
            .list_active_points()
            .map_err(DaemonError::Catalog)
    }

    fn load_points(&self) -> Result<usize, DaemonError> {
        let points = self.fetch_points()?;
        let count = points.len();
        self.registry.load(points)?;
        Ok(count)
    }

    /// Stop the scheduler, close the Modbus listener and every client
    /// connection.
    ///
    /// Each task is given the configured stop timeout before being aborted.
    /// Stopping a stopped daemon does nothing.
    pub async fn stop(&mut self) {
        if self.state == DaemonState::Stopped {
            debug!("Modbus point simulator already stopped");
            return;
        }

        self.state = DaemonState::Stopping;
        info!("Stopping Modbus point simulator");
        let timeout = self.config.simulation.stop_timeout();

        if let Some(heartbeat) = self.heartbeat_task.take() {
            heartbeat.abort();
        }

        self.scheduler.stop(timeout).await;

        if let Some(shutdown) = self.modbus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut task) = self.modbus_task.take() {
            match time::timeout(timeout, &mut task).await {
                Ok(Ok(Ok(()))) => debug!("Modbus listener and connections closed"),
                Ok(Ok(Err(e))) => warn!("Modbus server exited with error: {}", e),
                Ok(Err(e)) => error!("Modbus server task failed: {}", e),
                Err(_) => {
                    warn!("Modbus server did not stop within {:?}, aborting", timeout);
                    task.abort();
                }
            }
        }

        self.local_addr = None;
        self.state = DaemonState::Stopped;
        info!("Modbus point simulator stopped");
    }

    /// Fetch the points again and replace the registry generation.
    ///
    /// Returns the number of points loaded. On failure the previous points
    /// stay in effect.
    pub fn reload(&self) -> Result<usize, DaemonError> {
        if self.state != DaemonState::Running {
            return Err(DaemonError::InvalidState {
                operation: "reload",
                state: self.state,
            });
        }
        let count = self.load_points()?;
        info!("Reloaded {} points", count);
        Ok(count)
    }

    /// Change the update interval and persist it in the catalog.
    ///
    /// The new interval applies from the next tick. It is kept in effect even
    /// when persisting fails; the catalog error is still returned.
    pub fn set_interval(&self, seconds: f64) -> Result<(), DaemonError> {
        self.scheduler.set_interval(seconds)?;
        self.catalog
            .set_config(UPDATE_INTERVAL_KEY, &seconds.to_string())
            .map_err(DaemonError::Catalog)
    }

    /// Log the current point values every `period` until the daemon stops.
    pub fn start_heartbeat(&mut self, period: Duration) -> Result<(), DaemonError> {
        if self.state != DaemonState::Running {
            return Err(DaemonError::InvalidState {
                operation: "start heartbeat",
                state: self.state,
            });
        }
        if period.is_zero() {
            return Err(DaemonError::InvalidInterval(0.0));
        }
        if let Some(previous) = self.heartbeat_task.take() {
            previous.abort();
        }

        debug!("Starting heartbeat monitor");
        let registry = self.registry.clone();
        self.heartbeat_task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for (id, reading) in registry.point_values() {
                    info!("Point {} ({}): {}", id, reading.name, reading.value);
                }
            }
        }));
        Ok(())
    }

    /// Current value and name of every point, keyed by id.
    pub fn point_values(&self) -> BTreeMap<PointId, PointReading> {
        self.registry.point_values()
    }

    /// Update interval currently in effect, in seconds.
    pub fn update_interval(&self) -> f64 {
        self.scheduler.interval()
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Address the Modbus listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<PointRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            state: self.state,
            address: self.config.modbus.address.clone(),
            port: self.config.modbus.port,
            local_addr: self.local_addr,
            update_interval: self.scheduler.interval(),
            point_count: self.registry.len(),
            active_point_count: self.registry.active_count(),
            ticks: self.scheduler.tick_count(),
            last_tick: self.scheduler.last_tick(),
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(task) = self.modbus_task.take() {
            task.abort();
        }
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }
}
