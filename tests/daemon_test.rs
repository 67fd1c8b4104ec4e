// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Lifecycle tests for the Daemon
//!
//! Each test runs a real daemon on a loopback port and talks to it through a
//! `tokio-modbus` client or directly through its registry.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_modbus::prelude::*;

use modbus_point_simulator::catalog::{DeviceCatalog, MemoryCatalog, UPDATE_INTERVAL_KEY};
use modbus_point_simulator::config::Config;
use modbus_point_simulator::daemon::{Daemon, DaemonState};
use modbus_point_simulator::error::{DaemonError, RegistryError};
use modbus_point_simulator::modbus::codec;
use modbus_point_simulator::simulation::{DataType, PointDefinition, PointValue};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config(port: u16, interval: f64) -> Config {
    let mut config = Config::default();
    config.modbus.address = "127.0.0.1".to_string();
    config.modbus.port = port;
    config.modbus.register_count = 32;
    config.simulation.update_interval = interval;
    config.simulation.stop_timeout_ms = 1000;
    config.simulation.seed = Some(7);
    config
}

/// A loopback port that was free a moment ago.
fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn point_a() -> PointDefinition {
    PointDefinition::new(1, "A", 0, DataType::Float, 10.0, 90.0)
}

fn point_b() -> PointDefinition {
    PointDefinition::new(2, "B", 4, DataType::Float, 10.0, 90.0)
}

/// Poll `check` every few milliseconds until it holds or two seconds pass.
async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_start_serves_generated_values() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(0, 0.05), catalog)?;

    daemon.start().await?;
    assert_eq!(daemon.state(), DaemonState::Running);
    let addr: SocketAddr = daemon.local_addr().ok_or("listener not bound")?;

    let registry = daemon.registry().clone();
    assert!(eventually(|| registry.get(1).unwrap().current_value != PointValue::Float(0.0)).await);

    let mut ctx = tcp::connect(addr).await?;
    let words = ctx.read_holding_registers(0, 2).await??;
    let value = codec::decode([words[0], words[1]], DataType::Float).as_f64();
    assert!((10.0..=90.0).contains(&value), "value {} out of bounds", value);
    ctx.disconnect().await?;

    let values = daemon.point_values();
    assert_eq!(values[&1].name, "A");

    let status = daemon.status();
    assert_eq!(status.state, DaemonState::Running);
    assert_eq!(status.point_count, 1);
    assert!(status.ticks >= 1);
    assert!(status.last_tick.is_some());

    daemon.stop().await;
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(daemon.local_addr().is_none());
    Ok(())
}

#[tokio::test]
async fn test_reload_moves_updates_to_new_addresses() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(0, 0.02), catalog.clone())?;
    daemon.start().await?;

    let store = daemon.registry().store().clone();
    assert!(eventually(|| store.read(0, 2) != Some(vec![0, 0])).await);

    catalog.replace_points(vec![point_b()]);
    assert_eq!(daemon.reload()?, 1);
    assert!(daemon.registry().get(1).is_none());

    assert!(eventually(|| store.read(4, 2) != Some(vec![0, 0])).await);
    // Several more ticks, address 0 stays cleared
    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.read(0, 2), Some(vec![0, 0]));

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_invalid_reload_keeps_previous_points() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a(), point_b()]));
    let mut daemon = Daemon::new(test_config(0, 0.05), catalog.clone())?;
    daemon.start().await?;

    let mut inverted = point_b();
    inverted.min_value = 100.0;
    catalog.replace_points(vec![point_a(), inverted]);
    assert!(matches!(
        daemon.reload(),
        Err(DaemonError::Registry(RegistryError::InvertedBounds { id: 2, .. }))
    ));
    assert_eq!(daemon.registry().len(), 2);
    assert_eq!(daemon.state(), DaemonState::Running);

    catalog.set_unavailable(true);
    assert!(matches!(daemon.reload(), Err(DaemonError::Catalog(_))));
    assert_eq!(daemon.registry().len(), 2);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_deactivated_point_is_frozen() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a(), point_b()]));
    let mut daemon = Daemon::new(test_config(0, 0.02), catalog.clone())?;
    daemon.start().await?;

    let registry = daemon.registry().clone();
    assert!(eventually(|| registry.get(1).unwrap().current_value != PointValue::Float(0.0)).await);

    catalog.set_point_active(1, false);
    daemon.reload()?;
    let frozen = registry.get(1).unwrap().current_value;

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(registry.get(1).unwrap().current_value, frozen);
    assert_eq!(daemon.point_values()[&1].value, frozen);
    assert_eq!(daemon.status().active_point_count, 1);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_restart_binds_same_port() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let port = free_port();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(port, 0.05), catalog)?;

    for _ in 0..3 {
        daemon.start().await?;
        let addr = daemon.local_addr().ok_or("listener not bound")?;
        assert_eq!(addr.port(), port);

        let mut ctx = tcp::connect(addr).await?;
        ctx.read_holding_registers(0, 2).await??;
        ctx.disconnect().await?;

        daemon.stop().await;
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }
    Ok(())
}

#[tokio::test]
async fn test_stop_disconnects_clients() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut config = test_config(0, 0.05);
    config.modbus.identity.server_id = 5;
    let mut daemon = Daemon::new(config, catalog)?;
    daemon.start().await?;
    let addr = daemon.local_addr().ok_or("listener not bound")?;

    let mut ctx = tcp::connect(addr).await?;
    ctx.read_holding_registers(0, 2).await??;
    match ctx.call(Request::ReportServerId).await?? {
        Response::ReportServerId(server_id, running, _) => {
            assert_eq!(server_id, 5);
            assert!(running);
        }
        other => panic!("unexpected response {other:?}"),
    }

    daemon.stop().await;
    let store = daemon.registry().store().clone();
    let before = store.snapshot();

    let read = time::timeout(Duration::from_secs(1), ctx.read_holding_registers(0, 2)).await;
    assert!(!matches!(read, Ok(Ok(Ok(_)))), "read served after stop: {read:?}");
    let write = time::timeout(Duration::from_secs(1), ctx.write_single_register(0, 1234)).await;
    assert!(!matches!(write, Ok(Ok(Ok(_)))), "write served after stop: {write:?}");
    assert_eq!(store.snapshot(), before);
    Ok(())
}

#[tokio::test]
async fn test_failed_start_keeps_previous_points() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let port = free_port();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(port, 0.02), catalog.clone())?;

    daemon.start().await?;
    let store = daemon.registry().store().clone();
    assert!(eventually(|| store.read(0, 2) != Some(vec![0, 0])).await);
    daemon.stop().await;

    let before = store.snapshot();
    let value = daemon.registry().get(1).ok_or("point 1 missing")?.current_value;

    let occupied = StdTcpListener::bind(("127.0.0.1", port))?;
    catalog.replace_points(vec![point_b()]);
    assert!(matches!(daemon.start().await, Err(DaemonError::Bind { .. })));
    assert_eq!(daemon.state(), DaemonState::Stopped);

    // Neither the point set nor the store were touched
    assert!(daemon.registry().get(2).is_none());
    assert_eq!(daemon.registry().get(1).ok_or("point 1 missing")?.current_value, value);
    assert_eq!(store.snapshot(), before);
    drop(occupied);
    Ok(())
}

#[tokio::test]
async fn test_stop_closes_listener() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(0, 0.05), catalog)?;
    daemon.start().await?;
    let addr = daemon.local_addr().ok_or("listener not bound")?;

    daemon.stop().await;
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_start_failure_reverts_to_stopped() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    catalog.set_unavailable(true);
    let mut daemon = Daemon::new(test_config(0, 0.05), catalog.clone())?;

    assert!(matches!(daemon.start().await, Err(DaemonError::Catalog(_))));
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(daemon.local_addr().is_none());
    assert_eq!(daemon.status().ticks, 0);

    // Overlapping active points
    catalog.set_unavailable(false);
    catalog.replace_points(vec![
        point_a(),
        PointDefinition::new(3, "C", 1, DataType::Int, 0.0, 10.0),
    ]);
    assert!(matches!(
        daemon.start().await,
        Err(DaemonError::Registry(RegistryError::AddressOverlap { .. }))
    ));
    assert_eq!(daemon.state(), DaemonState::Stopped);

    catalog.replace_points(vec![point_a()]);
    daemon.start().await?;
    assert_eq!(daemon.state(), DaemonState::Running);
    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_bind_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let occupied = StdTcpListener::bind("127.0.0.1:0")?;
    let port = occupied.local_addr()?.port();

    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(port, 0.05), catalog)?;

    assert!(matches!(daemon.start().await, Err(DaemonError::Bind { .. })));
    assert_eq!(daemon.state(), DaemonState::Stopped);
    // Nothing was started
    assert_eq!(daemon.status().ticks, 0);
    drop(occupied);
    Ok(())
}

#[tokio::test]
async fn test_invalid_transitions() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(0, 0.05), catalog)?;

    // Stop on a stopped daemon is a no-op
    daemon.stop().await;
    daemon.stop().await;
    assert_eq!(daemon.state(), DaemonState::Stopped);

    assert!(matches!(
        daemon.reload(),
        Err(DaemonError::InvalidState {
            operation: "reload",
            state: DaemonState::Stopped
        })
    ));

    assert!(matches!(
        daemon.start_heartbeat(Duration::from_secs(1)),
        Err(DaemonError::InvalidState { .. })
    ));

    daemon.start().await?;
    daemon.start_heartbeat(Duration::from_millis(20))?;
    assert!(daemon.start_heartbeat(Duration::ZERO).is_err());
    assert!(matches!(
        daemon.start().await,
        Err(DaemonError::InvalidState {
            operation: "start",
            state: DaemonState::Running
        })
    ));
    daemon.stop().await;
    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_set_interval_persists_and_is_used_on_start() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let mut daemon = Daemon::new(test_config(0, 2.0), catalog.clone())?;

    // Valid while stopped
    daemon.set_interval(0.25)?;
    assert_eq!(daemon.update_interval(), 0.25);
    assert_eq!(
        catalog.get_config(UPDATE_INTERVAL_KEY)?.as_deref(),
        Some("0.25")
    );

    assert!(matches!(
        daemon.set_interval(0.0),
        Err(DaemonError::InvalidInterval(_))
    ));
    assert!(matches!(
        daemon.set_interval(f64::NAN),
        Err(DaemonError::InvalidInterval(_))
    ));
    assert_eq!(daemon.update_interval(), 0.25);

    daemon.start().await?;
    assert_eq!(daemon.update_interval(), 0.25);
    daemon.set_interval(0.5)?;
    assert_eq!(daemon.status().update_interval, 0.5);
    daemon.stop().await;

    // A fresh daemon picks the persisted interval up from the catalog
    let mut other = Daemon::new(test_config(0, 2.0), catalog)?;
    other.start().await?;
    assert_eq!(other.update_interval(), 0.5);
    other.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_interval_setting_fallbacks() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(
        MemoryCatalog::new(vec![point_a()]).with_setting(UPDATE_INTERVAL_KEY, "not a number"),
    );
    let mut daemon = Daemon::new(test_config(0, 1.5), catalog.clone())?;
    daemon.start().await?;
    assert_eq!(daemon.update_interval(), 1.5);
    daemon.stop().await;

    catalog.set_config(UPDATE_INTERVAL_KEY, "-3")?;
    daemon.start().await?;
    assert_eq!(daemon.update_interval(), 1.5);
    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_set_interval_reports_persistence_failure() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let catalog = Arc::new(MemoryCatalog::new(vec![point_a()]));
    let daemon = Daemon::new(test_config(0, 2.0), catalog.clone())?;

    catalog.set_unavailable(true);
    assert!(matches!(
        daemon.set_interval(0.75),
        Err(DaemonError::Catalog(_))
    ));
    // Still applied in memory
    assert_eq!(daemon.update_interval(), 0.75);
    Ok(())
}
