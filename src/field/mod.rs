//! Field classification and per-field plans.
//!
//! Jedes Feld wird beim Kompilieren genau einmal in eine geschlossene
//! [`FieldVariant`] eingeordnet. Die Variante legt Storage-Form, Wire-Regeln
//! und damit alle Operationen des Feldes fest (siehe [`storage`]).

pub mod storage;
pub mod value;

use crate::layout::{EnumId, MessageId};
use crate::presence::PresenceBit;
use crate::wire_type::{make_tag, WireType};

pub use value::{NumericKind, Scalar, ScalarType};

/// Declaration index of a field inside its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldIdx(pub(crate) usize);

impl FieldIdx {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Declared type of a field after name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
    Numeric(NumericKind),
    String,
    Bytes,
    Message(MessageId),
}

/// Closed classification of (kind × cardinality × packing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldVariant {
    Scalar(NumericKind),
    String,
    Bytes,
    Message(MessageId),
    RepeatedScalar { kind: NumericKind, packed: bool },
    RepeatedString,
    RepeatedBytes,
    RepeatedMessage(MessageId),
}

impl FieldVariant {
    /// Total classification function.
    pub fn classify(ty: ResolvedType, repeated: bool, packed: bool) -> Self {
        match (ty, repeated) {
            (ResolvedType::Numeric(kind), false) => Self::Scalar(kind),
            (ResolvedType::String, false) => Self::String,
            (ResolvedType::Bytes, false) => Self::Bytes,
            (ResolvedType::Message(id), false) => Self::Message(id),
            (ResolvedType::Numeric(kind), true) => Self::RepeatedScalar { kind, packed },
            (ResolvedType::String, true) => Self::RepeatedString,
            (ResolvedType::Bytes, true) => Self::RepeatedBytes,
            (ResolvedType::Message(id), true) => Self::RepeatedMessage(id),
        }
    }

    pub fn is_repeated(self) -> bool {
        matches!(
            self,
            Self::RepeatedScalar { .. } | Self::RepeatedString | Self::RepeatedBytes | Self::RepeatedMessage(_)
        )
    }

    /// Numeric kind for scalar variants (singular or repeated).
    pub fn numeric_kind(self) -> Option<NumericKind> {
        match self {
            Self::Scalar(kind) | Self::RepeatedScalar { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn enum_id(self) -> Option<EnumId> {
        match self.numeric_kind() {
            Some(NumericKind::Enum(id)) => Some(id),
            _ => None,
        }
    }

    pub fn message_id(self) -> Option<MessageId> {
        match self {
            Self::Message(id) | Self::RepeatedMessage(id) => Some(id),
            _ => None,
        }
    }

    /// Wire type of one unpacked occurrence.
    pub fn element_wire_type(self) -> WireType {
        match self {
            Self::Scalar(kind) | Self::RepeatedScalar { kind, .. } => kind.wire_type(),
            Self::String
            | Self::Bytes
            | Self::Message(_)
            | Self::RepeatedString
            | Self::RepeatedBytes
            | Self::RepeatedMessage(_) => WireType::LengthDelimited,
        }
    }

    /// Short label for diagnostics and `protolite plan`.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Message(_) => "message",
            Self::RepeatedScalar { packed: true, .. } => "repeated scalar (packed)",
            Self::RepeatedScalar { packed: false, .. } => "repeated scalar",
            Self::RepeatedString => "repeated string",
            Self::RepeatedBytes => "repeated bytes",
            Self::RepeatedMessage(_) => "repeated message",
        }
    }
}

/// Which tag form a dispatch entry matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagForm {
    /// Element wire type (one tag per value for repeated fields).
    Normal,
    /// Length-delimited run of a repeated numeric field.
    Packed,
}

/// Compiled default of a singular field.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Bits as stored by [`NumericKind`].
    Scalar(u64),
    Text(String),
    Blob(Vec<u8>),
}

/// Everything the runtime needs to know about one field.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub(crate) name: String,
    pub(crate) number: u32,
    pub(crate) index: FieldIdx,
    pub(crate) variant: FieldVariant,
    /// Tag der unpacked/singulären Form.
    pub(crate) tag: u32,
    /// Length-delimited Tag, nur für repeated numeric.
    pub(crate) packed_tag: Option<u32>,
    pub(crate) presence: Option<PresenceBit>,
    pub(crate) required: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) docs: Vec<String>,
}

impl FieldPlan {
    pub(crate) fn new(
        name: String,
        number: u32,
        index: usize,
        variant: FieldVariant,
        presence: Option<PresenceBit>,
        required: bool,
    ) -> Self {
        let packed_tag = match variant {
            FieldVariant::RepeatedScalar { .. } => Some(make_tag(number, WireType::LengthDelimited)),
            _ => None,
        };
        Self {
            name,
            number,
            index: FieldIdx(index),
            variant,
            tag: make_tag(number, variant.element_wire_type()),
            packed_tag,
            presence,
            required,
            default: None,
            docs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn index(&self) -> FieldIdx {
        self.index
    }

    pub fn variant(&self) -> FieldVariant {
        self.variant
    }

    /// Tag written in front of each occurrence (unpacked form).
    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn packed_tag(&self) -> Option<u32> {
        self.packed_tag
    }

    /// Tag actually used by `serialize`.
    pub fn write_tag(&self) -> u32 {
        match (self.variant, self.packed_tag) {
            (FieldVariant::RepeatedScalar { packed: true, .. }, Some(tag)) => tag,
            _ => self.tag,
        }
    }

    pub fn presence(&self) -> Option<PresenceBit> {
        self.presence
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_repeated(&self) -> bool {
        self.variant.is_repeated()
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn docs(&self) -> &[String] {
        &self.docs
    }
}
