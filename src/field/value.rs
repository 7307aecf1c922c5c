//! Numeric kinds and their wire codec.
//!
//! Alle numerischen Werte (inkl. bool und enum) werden intern als `u64`
//! Bitmuster gespeichert. Die Umrechnung in Rust-Typen passiert nur an der
//! Accessor-Grenze über [`Scalar`]; Codec-Funktionen arbeiten ausschließlich
//! auf den Bits und sind pro [`NumericKind`] erschöpfend ausgeprägt.
//!
//! Bit conventions:
//! - `bool`: 0 or 1
//! - 32-bit kinds (incl. `enum`, `float`): the 32-bit pattern, zero-extended
//! - 64-bit kinds (incl. `double`): the 64-bit pattern

use crate::bytestream::{WireReader, WireWriter};
use crate::layout::EnumId;
use crate::wire_type::WireType;
use crate::{fixed, varint, zigzag, Error, Result};

/// Scalar kinds that share the numeric storage and codec path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    Enum(EnumId),
}

/// A numeric value in its Rust representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
        }
    }
}

/// Rust types usable with the typed numeric accessors (`get::<T>`, `set`).
pub trait ScalarType: Copy {
    const NAME: &'static str;
    fn into_scalar(self) -> Scalar;
    fn from_scalar(value: Scalar) -> Option<Self>;
}

macro_rules! scalar_type {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ScalarType for $ty {
            const NAME: &'static str = $name;

            #[inline]
            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Option<Self> {
                match value {
                    Scalar::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_type!(bool, Bool, "bool");
scalar_type!(i32, I32, "i32");
scalar_type!(i64, I64, "i64");
scalar_type!(u32, U32, "u32");
scalar_type!(u64, U64, "u64");
scalar_type!(f32, F32, "f32");
scalar_type!(f64, F64, "f64");

impl NumericKind {
    /// Wire type of one element in unpacked form.
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Bool
            | Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64
            | Self::Enum(_) => WireType::Varint,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
        }
    }

    /// Name of the Rust type this kind is accessed as.
    pub fn repr(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 | Self::Sint32 | Self::Sfixed32 | Self::Enum(_) => "i32",
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => "i64",
            Self::Uint32 | Self::Fixed32 => "u32",
            Self::Uint64 | Self::Fixed64 => "u64",
            Self::Float => "f32",
            Self::Double => "f64",
        }
    }

    /// Schema keyword (`enum` for all enum kinds).
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Enum(_) => "enum",
        }
    }

    /// Converts stored bits to the Rust representation.
    pub fn to_scalar(self, bits: u64) -> Scalar {
        match self {
            Self::Bool => Scalar::Bool(bits != 0),
            Self::Int32 | Self::Sint32 | Self::Sfixed32 | Self::Enum(_) => Scalar::I32(bits as u32 as i32),
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => Scalar::I64(bits as i64),
            Self::Uint32 | Self::Fixed32 => Scalar::U32(bits as u32),
            Self::Uint64 | Self::Fixed64 => Scalar::U64(bits),
            Self::Float => Scalar::F32(f32::from_bits(bits as u32)),
            Self::Double => Scalar::F64(f64::from_bits(bits)),
        }
    }

    /// Converts a Rust value to stored bits; the value's type must match [`repr`](Self::repr).
    pub fn to_bits(self, field: &str, value: Scalar) -> Result<u64> {
        let bits = match (self, value) {
            (Self::Bool, Scalar::Bool(b)) => u64::from(b),
            (Self::Int32 | Self::Sint32 | Self::Sfixed32 | Self::Enum(_), Scalar::I32(v)) => u64::from(v as u32),
            (Self::Int64 | Self::Sint64 | Self::Sfixed64, Scalar::I64(v)) => v as u64,
            (Self::Uint32 | Self::Fixed32, Scalar::U32(v)) => u64::from(v),
            (Self::Uint64 | Self::Fixed64, Scalar::U64(v)) => v,
            (Self::Float, Scalar::F32(v)) => u64::from(v.to_bits()),
            (Self::Double, Scalar::F64(v)) => v.to_bits(),
            (kind, value) => {
                return Err(Error::type_mismatch(
                    field.to_string(),
                    kind.repr(),
                    value.type_name(),
                ))
            }
        };
        Ok(bits)
    }

    /// Writes one value (no tag).
    pub fn write(self, writer: &mut WireWriter, bits: u64) {
        match self {
            Self::Bool => writer.write_byte(u8::from(bits != 0)),
            Self::Int32 | Self::Enum(_) => varint::write_varint32(writer, bits as u32 as i32),
            Self::Uint32 => varint::write_varint_u32(writer, bits as u32),
            Self::Sint32 => zigzag::write_signed_varint32(writer, bits as u32 as i32),
            Self::Int64 | Self::Uint64 => varint::write_varint64(writer, bits),
            Self::Sint64 => zigzag::write_signed_varint64(writer, bits as i64),
            Self::Fixed32 | Self::Sfixed32 | Self::Float => fixed::write_fixed32(writer, bits as u32),
            Self::Fixed64 | Self::Sfixed64 | Self::Double => fixed::write_fixed64(writer, bits),
        }
    }

    /// Reads one value (tag already consumed).
    pub fn read(self, reader: &mut WireReader<'_>) -> Result<u64> {
        Ok(match self {
            // Jeder Wert != 0 ist true
            Self::Bool => u64::from(varint::read_varint64(reader)? != 0),
            Self::Int32 | Self::Uint32 | Self::Enum(_) => u64::from(varint::read_varint32(reader)? as u32),
            Self::Sint32 => u64::from(zigzag::read_signed_varint32(reader)? as u32),
            Self::Int64 | Self::Uint64 => varint::read_varint64(reader)?,
            Self::Sint64 => zigzag::read_signed_varint64(reader)? as u64,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => u64::from(fixed::read_fixed32(reader)?),
            Self::Fixed64 | Self::Sfixed64 | Self::Double => fixed::read_fixed64(reader)?,
        })
    }

    /// Bytes [`write`](Self::write) emits for `bits`.
    pub fn size(self, bits: u64) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int32 | Self::Enum(_) => varint::varint32_size(bits as u32 as i32),
            Self::Uint32 => varint::varint_u32_size(bits as u32),
            Self::Sint32 => zigzag::signed_varint32_size(bits as u32 as i32),
            Self::Int64 | Self::Uint64 => varint::varint64_size(bits),
            Self::Sint64 => zigzag::signed_varint64_size(bits as i64),
            Self::Fixed32 | Self::Sfixed32 | Self::Float => 4,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [NumericKind; 13] = [
        NumericKind::Bool,
        NumericKind::Int32,
        NumericKind::Int64,
        NumericKind::Uint32,
        NumericKind::Uint64,
        NumericKind::Sint32,
        NumericKind::Sint64,
        NumericKind::Fixed32,
        NumericKind::Fixed64,
        NumericKind::Sfixed32,
        NumericKind::Sfixed64,
        NumericKind::Float,
        NumericKind::Double,
    ];

    fn encode(kind: NumericKind, value: Scalar) -> Vec<u8> {
        let bits = kind.to_bits("f", value).unwrap();
        let mut w = WireWriter::new();
        kind.write(&mut w, bits);
        assert_eq!(w.position(), kind.size(bits), "{kind:?}");
        w.into_vec()
    }

    fn decode(kind: NumericKind, data: &[u8]) -> Scalar {
        let mut r = WireReader::new(data);
        let bits = kind.read(&mut r).unwrap();
        assert!(r.is_at_limit());
        kind.to_scalar(bits)
    }

    #[test]
    fn wire_types() {
        assert_eq!(NumericKind::Sint64.wire_type(), WireType::Varint);
        assert_eq!(NumericKind::Float.wire_type(), WireType::Fixed32);
        assert_eq!(NumericKind::Sfixed64.wire_type(), WireType::Fixed64);
        assert_eq!(NumericKind::Enum(EnumId(0)).wire_type(), WireType::Varint);
    }

    #[test]
    fn negative_int32_uses_ten_bytes() {
        let bytes = encode(NumericKind::Int32, Scalar::I32(-1));
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[9], 0x01);
        assert_eq!(decode(NumericKind::Int32, &bytes), Scalar::I32(-1));
    }

    #[test]
    fn negative_enum_number_uses_ten_bytes() {
        let kind = NumericKind::Enum(EnumId(3));
        let bytes = encode(kind, Scalar::I32(-2));
        assert_eq!(bytes.len(), 10);
        assert_eq!(decode(kind, &bytes), Scalar::I32(-2));
    }

    #[test]
    fn uint32_max_uses_five_bytes() {
        let bytes = encode(NumericKind::Uint32, Scalar::U32(u32::MAX));
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(decode(NumericKind::Uint32, &bytes), Scalar::U32(u32::MAX));
    }

    #[test]
    fn sint_zigzag() {
        assert_eq!(encode(NumericKind::Sint32, Scalar::I32(-1)), vec![0x01]);
        assert_eq!(encode(NumericKind::Sint64, Scalar::I64(-64)), vec![0x7F]);
        assert_eq!(decode(NumericKind::Sint32, &[0x03]), Scalar::I32(-2));
    }

    #[test]
    fn fixed_and_float() {
        assert_eq!(encode(NumericKind::Fixed32, Scalar::U32(1)), vec![1, 0, 0, 0]);
        assert_eq!(encode(NumericKind::Sfixed32, Scalar::I32(-1)), vec![0xFF; 4]);
        assert_eq!(
            encode(NumericKind::Double, Scalar::F64(1.0)),
            vec![0, 0, 0, 0, 0, 0, 0xF0, 0x3F]
        );
        assert_eq!(decode(NumericKind::Float, &[0, 0, 0x80, 0x3F]), Scalar::F32(1.0));
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        assert_eq!(decode(NumericKind::Bool, &[0x02]), Scalar::Bool(true));
        assert_eq!(decode(NumericKind::Bool, &[0x80, 0x01]), Scalar::Bool(true));
        assert_eq!(decode(NumericKind::Bool, &[0x00]), Scalar::Bool(false));
        assert_eq!(encode(NumericKind::Bool, Scalar::Bool(true)), vec![0x01]);
    }

    #[test]
    fn extremes_round_trip() {
        let cases = [
            (NumericKind::Int32, Scalar::I32(i32::MIN)),
            (NumericKind::Int32, Scalar::I32(i32::MAX)),
            (NumericKind::Int64, Scalar::I64(i64::MIN)),
            (NumericKind::Uint64, Scalar::U64(u64::MAX)),
            (NumericKind::Sint32, Scalar::I32(i32::MIN)),
            (NumericKind::Sint64, Scalar::I64(i64::MAX)),
            (NumericKind::Fixed64, Scalar::U64(u64::MAX)),
            (NumericKind::Sfixed64, Scalar::I64(i64::MIN)),
            (NumericKind::Float, Scalar::F32(-0.5)),
        ];
        for (kind, value) in cases {
            assert_eq!(decode(kind, &encode(kind, value)), value, "{kind:?}");
        }
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = NumericKind::Int64.to_bits("count", Scalar::I32(1)).unwrap_err();
        assert_eq!(err, Error::type_mismatch("count", "i64", "i32"));
        for kind in ALL {
            let zero = kind.to_scalar(0);
            assert_eq!(zero.type_name(), kind.repr(), "{kind:?}");
            assert_eq!(kind.to_bits("f", zero).unwrap(), 0);
        }
    }

    #[test]
    fn scalar_type_conversions() {
        assert_eq!(7i32.into_scalar(), Scalar::I32(7));
        assert_eq!(u64::from_scalar(Scalar::U64(9)), Some(9));
        assert_eq!(f32::from_scalar(Scalar::F64(1.0)), None);
        assert_eq!(<bool as ScalarType>::NAME, "bool");
    }
}
