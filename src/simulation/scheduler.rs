// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Periodic simulation scheduler
//!
//! A single background task that, once per interval, draws new values for
//! every active point of the registry, encodes them and commits them to the
//! register store.
//!
//! ## Timing
//!
//! The interval is read when a sleep begins. Changing it while the task is
//! sleeping does not shorten or lengthen that sleep: the new period applies
//! from the following tick on.
//!
//! ## Shutdown
//!
//! Stopping is cooperative. The running flag is checked at each tick
//! boundary and a shutdown notification wakes a sleeping task immediately.
//! [`SimulationScheduler::stop`] waits for the task with a bounded timeout and
//! aborts it if the timeout expires.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::{DaemonError, SimulationError};
use crate::modbus::codec;
use crate::simulation::generator::ValueGenerator;
use crate::simulation::point::Point;
use crate::simulation::registry::{PointRegistry, PointUpdate};
use crate::utility;

/// Update interval used when none is configured, in seconds.
pub const DEFAULT_UPDATE_INTERVAL: f64 = 2.0;

/// Whether `seconds` is usable as an update interval.
pub fn is_valid_interval(seconds: f64) -> bool {
    seconds > 0.0 && Duration::try_from_secs_f64(seconds).is_ok()
}

/// Update interval shared between the scheduler task and its controllers.
///
/// Stored as the bit pattern of an `f64` so it can be read without locking.
#[derive(Debug, Clone)]
pub struct UpdateInterval(Arc<AtomicU64>);

impl UpdateInterval {
    pub fn new(seconds: f64) -> Result<Self, DaemonError> {
        if !is_valid_interval(seconds) {
            return Err(DaemonError::InvalidInterval(seconds));
        }
        Ok(Self(Arc::new(AtomicU64::new(seconds.to_bits()))))
    }

    pub fn seconds(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds())
    }

    pub fn set(&self, seconds: f64) -> Result<(), DaemonError> {
        if !is_valid_interval(seconds) {
            return Err(DaemonError::InvalidInterval(seconds));
        }
        self.0.store(seconds.to_bits(), Ordering::SeqCst);
        Ok(())
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Registry generation the tick was computed against
    pub generation: u64,
    /// Points that received a new value
    pub updated: usize,
    /// Inactive points left untouched
    pub skipped: usize,
    /// Active points whose generation or encoding failed
    pub failed: usize,
    /// Whether the results were applied; false if a reload superseded them
    pub committed: bool,
}

/// Run one update pass over the registry.
///
/// A failure on one point is logged and counted; the remaining points are
/// still updated.
pub fn run_tick(registry: &PointRegistry, generator: &mut ValueGenerator) -> TickReport {
    let snapshot = registry.snapshot();
    let mut report = TickReport {
        generation: snapshot.generation,
        ..TickReport::default()
    };

    let mut updates = Vec::with_capacity(snapshot.points.len());
    for point in &snapshot.points {
        if !point.is_active() {
            report.skipped += 1;
            continue;
        }
        match next_update(point, generator) {
            Ok(update) => updates.push(update),
            Err(e) => {
                warn!(
                    "Skipping point '{}' (id {}) this tick: {}",
                    point.definition.name,
                    point.id(),
                    e
                );
                report.failed += 1;
            }
        }
    }

    report.updated = updates.len();
    report.committed = registry.commit(snapshot.generation, &updates);
    if !report.committed {
        report.updated = 0;
    }
    report
}

fn next_update(
    point: &Point,
    generator: &mut ValueGenerator,
) -> Result<PointUpdate, SimulationError> {
    let value = generator.generate(&point.definition)?;
    let words = codec::encode(value).map_err(|source| SimulationError::Encoding {
        id: point.id(),
        source,
    })?;
    Ok(PointUpdate {
        id: point.id(),
        address: point.address(),
        value,
        words,
    })
}

/// Background task regenerating point values on a timer.
pub struct SimulationScheduler {
    registry: Arc<PointRegistry>,
    generator: Arc<Mutex<ValueGenerator>>,
    interval: UpdateInterval,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    ticks: Arc<AtomicU64>,
    last_tick: Arc<Mutex<Option<DateTime<Utc>>>>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationScheduler {
    pub fn new(
        registry: Arc<PointRegistry>,
        generator: ValueGenerator,
        interval_seconds: f64,
    ) -> Result<Self, DaemonError> {
        Ok(Self {
            registry,
            generator: Arc::new(Mutex::new(generator)),
            interval: UpdateInterval::new(interval_seconds)?,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            ticks: Arc::new(AtomicU64::new(0)),
            last_tick: Arc::new(Mutex::new(None)),
            handle: None,
        })
    }

    /// Spawn the tick loop on the current Tokio runtime.
    ///
    /// The first tick runs immediately. Does nothing if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Simulation scheduler already running");
            return;
        }

        // A fresh notifier so a permit left by an earlier stop cannot end this run
        self.shutdown = Arc::new(Notify::new());
        self.running.store(true, Ordering::SeqCst);

        let registry = self.registry.clone();
        let generator = self.generator.clone();
        let interval = self.interval.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let ticks = self.ticks.clone();
        let last_tick = self.last_tick.clone();

        info!(
            "Starting simulation scheduler (interval: {}s)",
            interval.seconds()
        );

        self.handle = Some(tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let report = {
                    let mut generator = utility::lock(&generator);
                    run_tick(&registry, &mut generator)
                };
                ticks.fetch_add(1, Ordering::SeqCst);
                *utility::lock(&last_tick) = Some(Utc::now());
                debug!(
                    "Tick on generation {}: {} updated, {} inactive, {} failed",
                    report.generation, report.updated, report.skipped, report.failed
                );

                let period = interval.duration();
                tokio::select! {
                    _ = time::sleep(period) => {}
                    _ = shutdown.notified() => break,
                }
            }
            debug!("Simulation loop exited");
        }));
    }

    /// Signal the loop to stop and wait for it, at most `timeout`.
    ///
    /// Stopping a scheduler that is not running is a no-op.
    pub async fn stop(&mut self, timeout: Duration) {
        let Some(mut handle) = self.handle.take() else {
            debug!("Simulation scheduler already stopped");
            return;
        };

        info!("Stopping simulation scheduler");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();

        match time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => info!("Simulation scheduler stopped"),
            Ok(Err(e)) if e.is_cancelled() => debug!("Simulation task was cancelled"),
            Ok(Err(e)) => error!("Simulation task panicked: {}", e),
            Err(_) => {
                warn!(
                    "Simulation scheduler did not stop within {:?}, aborting it",
                    timeout
                );
                handle.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Interval in seconds.
    pub fn interval(&self) -> f64 {
        self.interval.seconds()
    }

    /// Change the interval. Takes effect from the next tick.
    pub fn set_interval(&self, seconds: f64) -> Result<(), DaemonError> {
        self.interval.set(seconds)?;
        info!("Simulation update interval set to {}s", seconds);
        Ok(())
    }

    /// Number of ticks run since creation.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        *utility::lock(&self.last_tick)
    }
}

impl Drop for SimulationScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.running.store(false, Ordering::SeqCst);
            handle.abort();
        }
    }
}
