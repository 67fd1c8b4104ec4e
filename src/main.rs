// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus point simulator
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use modbus_point_simulator::catalog::FileCatalog;
use modbus_point_simulator::config::{output_config_schema, Config};
use modbus_point_simulator::daemon::Daemon;

/// Simulated Modbus TCP device serving randomly generated point values
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file, created with defaults when missing
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Modbus server address, overrides the configuration
    #[arg(short, long)]
    address: Option<String>,

    /// Modbus server port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Update interval in seconds, persisted in the configuration settings
    #[arg(short, long)]
    interval: Option<f64>,

    /// Seed for reproducible value sequences
    #[arg(long)]
    seed: Option<u64>,

    /// Log point values every N seconds (0 disables)
    #[arg(long, default_value_t = 60)]
    heartbeat_secs: u64,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    if args.show_config_schema {
        return output_config_schema();
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(args.address, args.port, args.seed);

    let catalog = Arc::new(FileCatalog::new(&args.config));
    let mut daemon = Daemon::new(config, catalog)?;

    if let Some(interval) = args.interval {
        daemon.set_interval(interval)?;
    }

    daemon.start().await?;
    if let Some(addr) = daemon.local_addr() {
        info!(
            "Serving {} points on {} every {}s",
            daemon.registry().len(),
            addr,
            daemon.update_interval()
        );
    }
    if args.heartbeat_secs > 0 {
        daemon.start_heartbeat(Duration::from_secs(args.heartbeat_secs))?;
    }

    wait_for_shutdown(&daemon).await?;
    daemon.stop().await;
    Ok(())
}

/// Wait for Ctrl-C, reloading the points on every SIGHUP.
#[cfg(unix)]
async fn wait_for_shutdown(daemon: &Daemon) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Received Ctrl-C, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading points");
                if let Err(e) = daemon.reload() {
                    error!("Reload failed, keeping previous points: {}", e);
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_daemon: &Daemon) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    Ok(())
}
