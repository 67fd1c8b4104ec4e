// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server for the simulated device
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! Every request is answered from the shared [`RegisterStore`]. Holding and
//! input registers read the same words; coils and discrete inputs are bit
//! views of them (a non-zero word reads as `true`).

use std::{
    future::{self, Future},
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use log::{debug, error, info, warn};
use tokio::io::{copy_bidirectional, duplex, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_modbus::{prelude::*, server::tcp::Server};

use crate::modbus::identification::{DeviceIdentification, ENCAPSULATED_INTERFACE_TRANSPORT};
use crate::modbus::RegisterStore;
use crate::utility;

/// Largest quantity of registers a single read may request.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Largest quantity of coils or discrete inputs a single read may request.
pub const MAX_READ_BITS: u16 = 2000;
/// Largest quantity of registers a single write may carry.
pub const MAX_WRITE_REGISTERS: u16 = 123;
/// Largest quantity of coils a single write may carry.
pub const MAX_WRITE_COILS: u16 = 1968;
/// Largest quantity of registers the write part of function 23 may carry.
pub const MAX_READ_WRITE_REGISTERS: u16 = 121;

/// Buffer between a client socket and its request loop; a Modbus TCP ADU is
/// at most 260 bytes.
const RELAY_BUFFER_SIZE: usize = 1024;

/// Modbus service answering requests against the shared register store.
#[derive(Debug, Clone)]
pub struct SimulatorModbusServer {
    registers: RegisterStore,
    allow_writes: bool,
    identity: Arc<DeviceIdentification>,
}

impl tokio_modbus::server::Service for SimulatorModbusServer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("SERVER: {req:?}");
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&self.registers, addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::ReadInputRegisters(addr, cnt) => {
                register_read(&self.registers, addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::ReadCoils(addr, cnt) => {
                coil_read(&self.registers, addr, cnt).map(Response::ReadCoils)
            }
            Request::ReadDiscreteInputs(addr, cnt) => {
                coil_read(&self.registers, addr, cnt).map(Response::ReadDiscreteInputs)
            }
            Request::WriteSingleRegister(addr, value) => self
                .check_writable()
                .and_then(|_| {
                    register_write(&self.registers, addr, std::slice::from_ref(&value))
                })
                .map(|_| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleRegisters(addr, values) => self
                .check_writable()
                .and_then(|_| register_write(&self.registers, addr, &values))
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            Request::WriteSingleCoil(addr, value) => self
                .check_writable()
                .and_then(|_| coil_write(&self.registers, addr, std::slice::from_ref(&value)))
                .map(|_| Response::WriteSingleCoil(addr, value)),
            Request::WriteMultipleCoils(addr, values) => self
                .check_writable()
                .and_then(|_| coil_write(&self.registers, addr, &values))
                .map(|_| Response::WriteMultipleCoils(addr, values.len() as u16)),
            Request::MaskWriteRegister(addr, and_mask, or_mask) => self
                .check_writable()
                .and_then(|_| mask_write(&self.registers, addr, and_mask, or_mask))
                .map(|_| Response::MaskWriteRegister(addr, and_mask, or_mask)),
            Request::ReadWriteMultipleRegisters(read_addr, cnt, write_addr, values) => self
                .check_writable()
                .and_then(|_| {
                    register_write_read(&self.registers, write_addr, &values, read_addr, cnt)
                })
                .map(Response::ReadWriteMultipleRegisters),
            Request::ReportServerId => Ok(Response::ReportServerId(
                self.identity.server_id(),
                true,
                self.identity.server_id_data(),
            )),
            Request::Custom(ENCAPSULATED_INTERFACE_TRANSPORT, data) => self
                .identity
                .read(&data)
                .map(|body| Response::Custom(ENCAPSULATED_INTERFACE_TRANSPORT, body.into())),
            _ => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

impl SimulatorModbusServer {
    /// Create a service over `registers` reporting the default identity.
    ///
    /// With `allow_writes` false every write request is answered with
    /// `IllegalFunction`.
    pub fn new(registers: RegisterStore, allow_writes: bool) -> Self {
        Self {
            registers,
            allow_writes,
            identity: Arc::new(DeviceIdentification::default()),
        }
    }

    /// Report `identity` to identification requests.
    pub fn with_identity(mut self, identity: DeviceIdentification) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    fn check_writable(&self) -> Result<(), ExceptionCode> {
        if self.allow_writes {
            Ok(())
        } else {
            warn!("SERVER: Exception::IllegalFunction - writes are disabled");
            Err(ExceptionCode::IllegalFunction)
        }
    }
}

/// Accept connections on `listener` until `shutdown` completes or the
/// listener fails.
///
/// Each accepted connection is served by a clone of `service`. Its socket is
/// owned by a relay task of this function, so every client connection is
/// closed before `serve` returns.
pub async fn serve<F>(
    listener: TcpListener,
    service: SimulatorModbusServer,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Modbus server listening on {}", addr);
    }
    let server = Server::new(listener);
    let connections: Mutex<JoinSet<()>> = Mutex::new(JoinSet::new());

    let on_connected = |stream: TcpStream, socket_addr: SocketAddr| {
        let (transport, relay_end) = duplex(RELAY_BUFFER_SIZE);
        {
            let mut connections = utility::lock(&connections);
            // Reap relays of clients that already left
            while connections.try_join_next().is_some() {}
            connections.spawn(relay(stream, relay_end, socket_addr));
        }
        let service = service.clone();
        async move {
            debug!("Modbus client connected from {}", socket_addr);
            Ok::<_, io::Error>(Some((service, transport)))
        }
    };
    let on_process_error = |err: io::Error| {
        error!("Modbus connection error: {}", err);
    };

    let result = tokio::select! {
        result = server.serve(&on_connected, on_process_error) => result,
        () = shutdown => {
            debug!("Modbus server shutdown requested");
            Ok(())
        }
    };

    let mut connections = std::mem::take(&mut *utility::lock(&connections));
    if !connections.is_empty() {
        info!("Closing {} Modbus client connection(s)", connections.len());
    }
    connections.shutdown().await;
    result
}

/// Copy bytes between a client socket and the request loop serving it.
///
/// Dropping the relay closes the socket, and the request loop then sees the
/// end of its stream.
async fn relay(mut stream: TcpStream, mut transport: DuplexStream, socket_addr: SocketAddr) {
    match copy_bidirectional(&mut stream, &mut transport).await {
        Ok((received, sent)) => debug!(
            "Modbus client {} disconnected ({} bytes received, {} bytes sent)",
            socket_addr, received, sent
        ),
        Err(e) => debug!("Modbus client {} connection closed: {}", socket_addr, e),
    }
}

/// Helper function implementing reading registers from the store.
fn register_read(
    registers: &RegisterStore,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    check_quantity(cnt, MAX_READ_REGISTERS)?;
    registers.read(addr, cnt).ok_or_else(|| {
        error!("SERVER: Exception::IllegalDataAddress - read {cnt} registers at {addr}");
        ExceptionCode::IllegalDataAddress
    })
}

/// Write holding registers. Used by both the write single register
/// and write multiple registers requests.
fn register_write(
    registers: &RegisterStore,
    addr: u16,
    values: &[u16],
) -> Result<(), ExceptionCode> {
    check_quantity(values.len() as u16, MAX_WRITE_REGISTERS)?;
    if registers.write(addr, values) {
        Ok(())
    } else {
        error!(
            "SERVER: Exception::IllegalDataAddress - write {} registers at {addr}",
            values.len()
        );
        Err(ExceptionCode::IllegalDataAddress)
    }
}

/// Apply a mask write to one holding register.
fn mask_write(
    registers: &RegisterStore,
    addr: u16,
    and_mask: u16,
    or_mask: u16,
) -> Result<u16, ExceptionCode> {
    registers.mask_write(addr, and_mask, or_mask).ok_or_else(|| {
        error!("SERVER: Exception::IllegalDataAddress - mask write at {addr}");
        ExceptionCode::IllegalDataAddress
    })
}

/// Write then read holding registers, as function 23 requires.
fn register_write_read(
    registers: &RegisterStore,
    write_addr: u16,
    values: &[u16],
    read_addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    check_quantity(cnt, MAX_READ_REGISTERS)?;
    check_quantity(values.len() as u16, MAX_READ_WRITE_REGISTERS)?;
    registers
        .write_then_read(write_addr, values, read_addr, cnt)
        .ok_or_else(|| {
            error!(
                "SERVER: Exception::IllegalDataAddress - write {} registers at {write_addr}, read {cnt} at {read_addr}",
                values.len()
            );
            ExceptionCode::IllegalDataAddress
        })
}

fn coil_read(registers: &RegisterStore, addr: u16, cnt: u16) -> Result<Vec<bool>, ExceptionCode> {
    check_quantity(cnt, MAX_READ_BITS)?;
    registers
        .read(addr, cnt)
        .map(|words| words.into_iter().map(|w| w != 0).collect())
        .ok_or_else(|| {
            error!("SERVER: Exception::IllegalDataAddress - read {cnt} bits at {addr}");
            ExceptionCode::IllegalDataAddress
        })
}

fn coil_write(registers: &RegisterStore, addr: u16, values: &[bool]) -> Result<(), ExceptionCode> {
    check_quantity(values.len() as u16, MAX_WRITE_COILS)?;
    let words: Vec<u16> = values.iter().map(|&b| u16::from(b)).collect();
    if registers.write(addr, &words) {
        Ok(())
    } else {
        error!(
            "SERVER: Exception::IllegalDataAddress - write {} coils at {addr}",
            values.len()
        );
        Err(ExceptionCode::IllegalDataAddress)
    }
}

fn check_quantity(cnt: u16, max: u16) -> Result<(), ExceptionCode> {
    if cnt == 0 || cnt > max {
        error!("SERVER: Exception::IllegalDataValue - quantity {cnt} outside 1..={max}");
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}
