//! Fixed-width little-endian values (`fixed32/64`, `sfixed32/64`, `float`, `double`).
//!
//! Floats travel through the fixed path as their IEEE-754 bit pattern.

use crate::bytestream::{WireReader, WireWriter};
use crate::Result;

#[inline]
pub fn write_fixed32(writer: &mut WireWriter, value: u32) {
    writer.write_bytes(&value.to_le_bytes());
}

#[inline]
pub fn write_fixed64(writer: &mut WireWriter, value: u64) {
    writer.write_bytes(&value.to_le_bytes());
}

#[inline]
pub fn read_fixed32(reader: &mut WireReader<'_>) -> Result<u32> {
    Ok(u32::from_le_bytes(reader.read_array::<4>()?))
}

#[inline]
pub fn read_fixed64(reader: &mut WireReader<'_>) -> Result<u64> {
    Ok(u64::from_le_bytes(reader.read_array::<8>()?))
}

#[inline]
pub fn write_float(writer: &mut WireWriter, value: f32) {
    write_fixed32(writer, value.to_bits());
}

#[inline]
pub fn write_double(writer: &mut WireWriter, value: f64) {
    write_fixed64(writer, value.to_bits());
}

#[inline]
pub fn read_float(reader: &mut WireReader<'_>) -> Result<f32> {
    Ok(f32::from_bits(read_fixed32(reader)?))
}

#[inline]
pub fn read_double(reader: &mut WireReader<'_>) -> Result<f64> {
    Ok(f64::from_bits(read_fixed64(reader)?))
}
