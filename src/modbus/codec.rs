// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register encoding of point values
//!
//! Every point is carried as a signed 32-bit integer split over two
//! consecutive 16-bit registers, **low word first**:
//!
//! | Register      | Content                    |
//! |---------------|----------------------------|
//! | `address`     | bits 0..16 of the raw value  |
//! | `address + 1` | bits 16..32 of the raw value |
//!
//! Float points are scaled by 100 (two decimal places), so the representable
//! float range is `-21_474_836.48 ..= 21_474_836.47`. Values outside that range
//! are rejected with [`CodecError::OutOfRange`] rather than wrapped.

use crate::error::CodecError;
use crate::simulation::point::{DataType, PointValue, REGISTERS_PER_POINT};

/// Scale applied to float values before they are stored as integers.
pub const FLOAT_SCALE: f64 = 100.0;

/// Largest float value that survives encoding.
pub const MAX_FLOAT: f64 = i32::MAX as f64 / FLOAT_SCALE;

/// Smallest float value that survives encoding.
pub const MIN_FLOAT: f64 = i32::MIN as f64 / FLOAT_SCALE;

/// Convert a value to the raw 32-bit integer carried on the wire.
///
/// Floats are scaled by 100 and rounded to the nearest integer, which makes
/// `decode(encode(v))` equal to `v` rounded to two decimals.
pub fn to_raw(value: PointValue) -> Result<i32, CodecError> {
    match value {
        PointValue::Int(v) => i32::try_from(v).map_err(|_| CodecError::OutOfRange { value }),
        PointValue::Float(v) => {
            if !v.is_finite() {
                return Err(CodecError::NotFinite { value: v });
            }
            let scaled = (v * FLOAT_SCALE).round();
            if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
                return Err(CodecError::OutOfRange { value });
            }
            Ok(scaled as i32)
        }
    }
}

/// Interpret a raw wire integer as a value of the given type.
pub fn from_raw(raw: i32, data_type: DataType) -> PointValue {
    match data_type {
        DataType::Int => PointValue::Int(raw as i64),
        DataType::Float => PointValue::Float(raw as f64 / FLOAT_SCALE),
    }
}

/// Split a raw value into `[low, high]` register words.
pub fn split_words(raw: i32) -> [u16; 2] {
    let bits = raw as u32;
    [(bits & 0xFFFF) as u16, (bits >> 16) as u16]
}

/// Join `[low, high]` register words back into the raw value.
pub fn join_words(words: [u16; 2]) -> i32 {
    ((words[1] as u32) << 16 | words[0] as u32) as i32
}

/// Encode a point value into the two registers stored at its base address.
pub fn encode(value: PointValue) -> Result<[u16; 2], CodecError> {
    to_raw(value).map(split_words)
}

/// Decode the two registers of a point.
pub fn decode(words: [u16; 2], data_type: DataType) -> PointValue {
    from_raw(join_words(words), data_type)
}

/// Decode consecutive point pairs from a register block read by a client.
///
/// A trailing odd register is ignored.
pub fn decode_points(registers: &[u16], data_type: DataType) -> Vec<PointValue> {
    registers
        .chunks_exact(2)
        .map(|pair| decode([pair[0], pair[1]], data_type))
        .collect()
}

/// Address of the `index`-th point of a block of consecutive points starting
/// at `base`, or `None` past the last Modbus address.
pub fn point_address(base: u16, index: usize) -> Option<u16> {
    let offset = u16::try_from(index).ok()?.checked_mul(REGISTERS_PER_POINT)?;
    base.checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::round2;

    #[test]
    fn test_float_example_from_register_map() {
        let words = encode(PointValue::Float(42.37)).unwrap();
        assert_eq!(words, [4237, 0]);
        assert_eq!(decode([4237, 0], DataType::Float), PointValue::Float(42.37));
    }

    #[test]
    fn test_low_word_first() {
        // 70000 = 1 * 65536 + 4464
        assert_eq!(encode(PointValue::Int(70_000)).unwrap(), [4464, 1]);
        assert_eq!(decode([4464, 1], DataType::Int), PointValue::Int(70_000));
    }

    #[test]
    fn test_negative_values_use_twos_complement() {
        let words = encode(PointValue::Float(-1.5)).unwrap();
        assert_eq!(words, [0xFF6A, 0xFFFF]);
        assert_eq!(decode(words, DataType::Float), PointValue::Float(-1.5));

        let words = encode(PointValue::Int(-1)).unwrap();
        assert_eq!(words, [0xFFFF, 0xFFFF]);
    }

    #[test]
    fn test_float_round_trip_rounds_to_two_decimals() {
        // 0.29 * 100 is 28.999999999999996 in binary floating point
        for v in [0.29, 0.57, 12.345, -7.005, 99.999, 1234.5678, MAX_FLOAT, MIN_FLOAT] {
            let decoded = decode(encode(PointValue::Float(v)).unwrap(), DataType::Float);
            assert_eq!(decoded, PointValue::Float(round2(v)), "value {}", v);
        }
    }

    #[test]
    fn test_integer_extremes_are_exact() {
        for v in [i32::MIN as i64, -1, 0, 1, i32::MAX as i64] {
            let decoded = decode(encode(PointValue::Int(v)).unwrap(), DataType::Int);
            assert_eq!(decoded, PointValue::Int(v));
        }
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let too_big = PointValue::Float(MAX_FLOAT + 1.0);
        assert_eq!(encode(too_big), Err(CodecError::OutOfRange { value: too_big }));

        let too_small = PointValue::Int(i32::MIN as i64 - 1);
        assert_eq!(
            encode(too_small),
            Err(CodecError::OutOfRange { value: too_small })
        );

        assert!(matches!(
            encode(PointValue::Float(f64::NAN)),
            Err(CodecError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_decode_points_ignores_trailing_register() {
        let values = decode_points(&[4237, 0, 100, 0, 7], DataType::Float);
        assert_eq!(values, vec![PointValue::Float(42.37), PointValue::Float(1.0)]);
    }

    #[test]
    fn test_point_address_does_not_overflow() {
        assert_eq!(point_address(10, 0), Some(10));
        assert_eq!(point_address(10, 3), Some(16));
        assert_eq!(point_address(65534, 0), Some(65534));
        assert_eq!(point_address(65534, 1), None);
        assert_eq!(point_address(0, usize::MAX), None);
    }
}
