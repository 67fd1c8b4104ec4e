// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use clap::{Parser, ValueEnum};
use std::error::Error;
use tokio::time::Duration;
use tokio_modbus::prelude::*;

use modbus_point_simulator::modbus::codec;
use modbus_point_simulator::simulation::{DataType, REGISTERS_PER_POINT};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Table {
    Holding,
    Input,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PointType {
    Float,
    Int,
}

impl From<PointType> for DataType {
    fn from(value: PointType) -> Self {
        match value {
            PointType::Float => DataType::Float,
            PointType::Int => DataType::Int,
        }
    }
}

/// Modbus client reading and decoding points from a simulated device
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Base address of the first point
    #[clap(long, default_value = "0")]
    start: u16,

    /// Number of consecutive points to read
    #[clap(long, default_value = "5")]
    points: u16,

    /// Encoding of the points
    #[clap(long, value_enum, default_value = "float")]
    data_type: PointType,

    /// Register table to read
    #[clap(long, value_enum, default_value = "holding")]
    table: Table,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: std::net::SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let mut ctx = tcp::connect_slave(socket_addr, Slave(1)).await?;

    let quantity = args
        .points
        .checked_mul(REGISTERS_PER_POINT)
        .ok_or("too many points requested")?;
    println!(
        "Reading {} {:?} registers starting at address {}",
        quantity, args.table, args.start
    );

    let request = async {
        match args.table {
            Table::Holding => ctx.read_holding_registers(args.start, quantity).await,
            Table::Input => ctx.read_input_registers(args.start, quantity).await,
        }
    };
    let registers = tokio::time::timeout(Duration::from_secs(1), request).await???;

    println!("Raw register values: {:?}", registers);

    let data_type = DataType::from(args.data_type);
    for (i, value) in codec::decode_points(&registers, data_type)
        .into_iter()
        .enumerate()
    {
        let words = &registers[i * 2..i * 2 + 2];
        match codec::point_address(args.start, i) {
            Some(address) => println!("Point at {}: {} (words {:?})", address, value, words),
            None => println!("Point {} past the address space: {} (words {:?})", i, value, words),
        }
    }

    ctx.disconnect().await?;
    Ok(())
}
