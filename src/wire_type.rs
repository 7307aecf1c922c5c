//! Wire types, tags and unknown-field skipping.
//!
//! A tag is `(field_number << 3) | wire_type`, written as a varint in front
//! of every field occurrence. Groups (3/4) are reserved and not supported.

use log::trace;

use crate::bytestream::WireReader;
use crate::{Error, Result, varint};

/// Anzahl der Bits für den Wire Type im Tag.
pub const TAG_TYPE_BITS: u32 = 3;

/// Maske für den Wire Type im Tag.
pub const TAG_TYPE_MASK: u32 = 7;

/// Largest field number the wire format can express (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// How the bytes following a tag are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Decodes the 3-bit wire type; 6 and 7 are not defined.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::StartGroup => "start-group",
            Self::EndGroup => "end-group",
            Self::Fixed32 => "fixed32",
        }
    }
}

/// Computes the tag value for a field number and wire type.
#[inline]
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type as u32
}

#[inline]
pub const fn field_number_of(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

#[inline]
pub const fn wire_type_bits(tag: u32) -> u8 {
    (tag & TAG_TYPE_MASK) as u8
}

/// Skips exactly the bytes of one field occurrence whose tag was already read.
pub fn skip_unknown_field(tag: u32, reader: &mut WireReader<'_>) -> Result<()> {
    let bits = wire_type_bits(tag);
    trace!(
        "skipping unknown field {} (wire type {bits}) at offset {}",
        field_number_of(tag),
        reader.position()
    );
    match WireType::from_u8(bits) {
        Some(WireType::Varint) => {
            varint::read_varint64(reader)?;
        }
        Some(WireType::Fixed64) => reader.skip(8)?,
        Some(WireType::LengthDelimited) => {
            let len = varint::read_varint32(reader)?;
            let len = usize::try_from(len).map_err(|_| Error::PrematureEndOfStream)?;
            reader.skip(len)?;
        }
        Some(WireType::Fixed32) => reader.skip(4)?,
        Some(WireType::StartGroup | WireType::EndGroup) | None => {
            return Err(Error::UnknownWireType(bits));
        }
    }
    Ok(())
}
