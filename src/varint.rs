//! Variable-length integer encoding (base-128 varints).
//!
//! Each byte carries 7 data bits, least significant group first; the high
//! bit is the continuation flag. 32-bit values need at most 5 bytes,
//! 64-bit values at most 10.
//!
//! Negative `int32` values are sign-extended and always written in the
//! 10-byte 64-bit form, exactly like the reference encoder. The 32-bit
//! decoder therefore accepts (and discards) up to five trailing
//! continuation bytes after the fifth group.

use crate::bytestream::{WireReader, WireWriter};
use crate::{Error, Result};

/// Maximale Byte-Anzahl eines 64-Bit Varints.
pub const MAX_VARINT64_BYTES: usize = 10;

/// Maximale Byte-Anzahl eines 32-Bit Varints (ohne Sign-Extension).
pub const MAX_VARINT32_BYTES: usize = 5;

/// Writes a signed 32-bit value; negative values use the 10-byte form.
#[inline]
pub fn write_varint32(writer: &mut WireWriter, value: i32) {
    if value >= 0 {
        write_varint_u32(writer, value as u32);
    } else {
        write_varint64(writer, i64::from(value) as u64);
    }
}

/// Writes an unsigned 32-bit value (at most 5 bytes).
#[inline]
pub fn write_varint_u32(writer: &mut WireWriter, mut value: u32) {
    loop {
        if value & !0x7F == 0 {
            writer.write_byte(value as u8);
            return;
        }
        writer.write_byte((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
}

/// Writes a 64-bit value (at most 10 bytes).
#[inline]
pub fn write_varint64(writer: &mut WireWriter, mut value: u64) {
    loop {
        if value & !0x7F == 0 {
            writer.write_byte(value as u8);
            return;
        }
        writer.write_byte((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
}

/// Reads a 32-bit varint.
///
/// After the fifth byte the upper bits are discarded; up to five further
/// continuation bytes of a sign-extended 64-bit encoding are consumed. If
/// none of them terminates, the varint is malformed.
pub fn read_varint32(reader: &mut WireReader<'_>) -> Result<i32> {
    let byte = reader.read_byte()?;
    if byte & 0x80 == 0 {
        // Fast-Path: Single-Byte (Tags und kleine Längen)
        return Ok(i32::from(byte));
    }
    let mut result = u32::from(byte & 0x7F);
    let mut shift = 7;
    while shift < 28 {
        let byte = reader.read_byte()?;
        result |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
        shift += 7;
    }
    // Fünftes Byte: nur die unteren 4 Bits landen im Ergebnis
    let byte = reader.read_byte()?;
    result |= u32::from(byte) << 28;
    if byte & 0x80 == 0 {
        return Ok(result as i32);
    }
    // Obere 32 Bits einer 64-Bit Kodierung verwerfen
    for _ in 0..MAX_VARINT64_BYTES - MAX_VARINT32_BYTES {
        if reader.read_byte()? & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(Error::MalformedVarint)
}

/// Reads a 64-bit varint; more than 10 groups is malformed.
pub fn read_varint64(reader: &mut WireReader<'_>) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    while shift < 64 {
        let byte = reader.read_byte()?;
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
    Err(Error::MalformedVarint)
}

/// Bytes `write_varint32` emits: 10 for negative values, else 1..=5.
#[inline]
pub fn varint32_size(value: i32) -> usize {
    if value < 0 {
        MAX_VARINT64_BYTES
    } else {
        varint_u32_size(value as u32)
    }
}

/// Bytes `write_varint_u32` emits (1..=5), from the highest set bit.
#[inline]
pub fn varint_u32_size(value: u32) -> usize {
    ((31 - (value | 1).leading_zeros()) / 7 + 1) as usize
}

/// Bytes `write_varint64` emits (1..=10), from the highest set bit.
#[inline]
pub fn varint64_size(value: u64) -> usize {
    ((63 - (value | 1).leading_zeros()) / 7 + 1) as usize
}
