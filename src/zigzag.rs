//! ZigZag transform for `sint32`/`sint64`.
//!
//! Maps signed integers onto unsigned ones so that small magnitudes of
//! either sign encode into short varints: 0 → 0, -1 → 1, 1 → 2, -2 → 3, ...

use crate::bytestream::{WireReader, WireWriter};
use crate::Result;
use crate::varint;

#[inline]
pub fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

#[inline]
pub fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Writes a `sint32` value (zigzag, then unsigned varint; at most 5 bytes).
#[inline]
pub fn write_signed_varint32(writer: &mut WireWriter, value: i32) {
    varint::write_varint_u32(writer, encode_zigzag32(value));
}

#[inline]
pub fn read_signed_varint32(reader: &mut WireReader<'_>) -> Result<i32> {
    Ok(decode_zigzag32(varint::read_varint32(reader)? as u32))
}

#[inline]
pub fn write_signed_varint64(writer: &mut WireWriter, value: i64) {
    varint::write_varint64(writer, encode_zigzag64(value));
}

#[inline]
pub fn read_signed_varint64(reader: &mut WireReader<'_>) -> Result<i64> {
    Ok(decode_zigzag64(varint::read_varint64(reader)?))
}

#[inline]
pub fn signed_varint32_size(value: i32) -> usize {
    varint::varint_u32_size(encode_zigzag32(value))
}

#[inline]
pub fn signed_varint64_size(value: i64) -> usize {
    varint::varint64_size(encode_zigzag64(value))
}
