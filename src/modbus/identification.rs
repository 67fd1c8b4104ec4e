// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device identification
//!
//! Answers Report Server ID (0x11) and Read Device Identification
//! (0x2B with MEI type 0x0E) from the `modbus.identity` configuration.
//!
//! | Object | Name                 | Category |
//! |--------|----------------------|----------|
//! | `0x00` | VendorName           | basic    |
//! | `0x01` | ProductCode          | basic    |
//! | `0x02` | MajorMinorRevision   | basic    |
//! | `0x03` | VendorUrl            | regular  |
//! | `0x04` | ProductName          | regular  |
//! | `0x05` | ModelName            | regular  |

use log::warn;
use tokio_modbus::ExceptionCode;

use crate::config::IdentityConfig;

/// Function code of the encapsulated interface transport.
pub const ENCAPSULATED_INTERFACE_TRANSPORT: u8 = 0x2B;
/// MEI type of Read Device Identification.
pub const READ_DEVICE_IDENTIFICATION: u8 = 0x0E;

/// Regular identification, stream and individual access.
const CONFORMITY_LEVEL: u8 = 0x82;
/// Room left for objects in a 253-byte PDU after the function code and the
/// six header bytes.
const MAX_OBJECTS_LEN: usize = 246;
const MAX_OBJECT_LEN: usize = MAX_OBJECTS_LEN - 2;
/// Largest additional data of a Report Server ID response.
const MAX_SERVER_ID_DATA: usize = 250;

/// Read Device ID code of a 0x2B / 0x0E request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDeviceIdCode {
    Basic = 0x01,
    Regular = 0x02,
    Extended = 0x03,
    Specific = 0x04,
}

impl TryFrom<u8> for ReadDeviceIdCode {
    type Error = ExceptionCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Basic),
            0x02 => Ok(Self::Regular),
            0x03 => Ok(Self::Extended),
            0x04 => Ok(Self::Specific),
            _ => Err(ExceptionCode::IllegalDataValue),
        }
    }
}

impl ReadDeviceIdCode {
    /// Last object id of the stream category.
    fn last_object(self) -> u8 {
        match self {
            Self::Basic => 0x02,
            Self::Regular => 0x7F,
            Self::Extended | Self::Specific => 0xFF,
        }
    }
}

/// Identification objects, encoded once per service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentification {
    server_id: u8,
    objects: Vec<(u8, Vec<u8>)>,
}

impl Default for DeviceIdentification {
    fn default() -> Self {
        Self::new(&IdentityConfig::default())
    }
}

impl DeviceIdentification {
    pub fn new(config: &IdentityConfig) -> Self {
        let basic = [
            &config.vendor_name,
            &config.product_code,
            &config.major_minor_revision,
        ];
        let regular = [&config.vendor_url, &config.product_name, &config.model_name];

        let mut objects: Vec<(u8, Vec<u8>)> = basic
            .iter()
            .enumerate()
            .map(|(id, value)| (id as u8, truncated(value, MAX_OBJECT_LEN)))
            .collect();
        // Regular objects are optional; empty ones are not published
        objects.extend(
            regular
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_empty())
                .map(|(i, value)| (0x03 + i as u8, truncated(value, MAX_OBJECT_LEN))),
        );

        Self {
            server_id: config.server_id,
            objects,
        }
    }

    pub fn server_id(&self) -> u8 {
        self.server_id
    }

    /// Additional data of the Report Server ID response: the basic objects
    /// separated by spaces.
    pub fn server_id_data(&self) -> Vec<u8> {
        let joined = self
            .objects
            .iter()
            .filter(|(id, _)| *id <= ReadDeviceIdCode::Basic.last_object())
            .map(|(_, value)| String::from_utf8_lossy(value).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        truncated(&joined, MAX_SERVER_ID_DATA)
    }

    /// Answer the data of a 0x2B request, MEI type byte included.
    ///
    /// Stream requests starting at an object the category does not hold
    /// restart at object `0x00`. Objects that do not fit in one response are
    /// announced with the "more follows" flag and the next object id.
    pub fn read(&self, data: &[u8]) -> Result<Vec<u8>, ExceptionCode> {
        let &[mei_type, code, object_id] = data else {
            warn!("SERVER: Exception::IllegalDataValue - malformed device identification request {data:?}");
            return Err(ExceptionCode::IllegalDataValue);
        };
        if mei_type != READ_DEVICE_IDENTIFICATION {
            warn!("SERVER: Exception::IllegalFunction - unsupported MEI type 0x{mei_type:02X}");
            return Err(ExceptionCode::IllegalFunction);
        }
        let code = ReadDeviceIdCode::try_from(code)?;

        let selected: Vec<&(u8, Vec<u8>)> = if code == ReadDeviceIdCode::Specific {
            let object = self
                .objects
                .iter()
                .find(|(id, _)| *id == object_id)
                .ok_or(ExceptionCode::IllegalDataAddress)?;
            vec![object]
        } else {
            let last = code.last_object();
            let start = if object_id <= last && self.objects.iter().any(|(id, _)| *id == object_id)
            {
                object_id
            } else {
                0x00
            };
            self.objects
                .iter()
                .filter(|(id, _)| (start..=last).contains(id))
                .collect()
        };

        let mut objects = Vec::new();
        let mut count = 0u8;
        let mut next_object = None;
        for (id, value) in selected {
            if objects.len() + 2 + value.len() > MAX_OBJECTS_LEN {
                next_object = Some(*id);
                break;
            }
            objects.push(*id);
            objects.push(value.len() as u8);
            objects.extend_from_slice(value);
            count += 1;
        }

        let mut response = vec![
            READ_DEVICE_IDENTIFICATION,
            code as u8,
            CONFORMITY_LEVEL,
            if next_object.is_some() { 0xFF } else { 0x00 },
            next_object.unwrap_or(0x00),
            count,
        ];
        response.extend_from_slice(&objects);
        Ok(response)
    }
}

/// Bytes of `value`, cut at a character boundary to at most `max` bytes.
fn truncated(value: &str, max: usize) -> Vec<u8> {
    let mut end = value.len().min(max);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.as_bytes()[..end].to_vec()
}
