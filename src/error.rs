//! Central error types for the protolite codec.
//!
//! Wire-level Fehler (Varint, Wire Type, Stream-Ende) entstehen beim Parsen
//! und werden unverändert an den Aufrufer von `parse_from` propagiert.
//! Accessor-Fehler (`FieldNotSet`, `IndexOutOfRange`, `TypeMismatch`) sind
//! lokal zum jeweiligen Aufruf. Schema-Fehler entstehen nur beim Kompilieren.

use core::fmt;
use std::borrow::Cow;

/// All error kinds raised by the codec, the schema compiler and the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A varint continued past the maximum group count for its target width.
    MalformedVarint,
    /// The source ended (or the current length limit was reached) mid-value.
    PrematureEndOfStream,
    /// A tag carried a wire type outside {0, 1, 2, 5}.
    UnknownWireType(u8),
    /// A tag with field number 0 was read.
    InvalidTag(u32),
    /// Getter on an unset optional field that has no declared default.
    FieldNotSet(Cow<'static, str>),
    /// Indexed access to a repeated field outside `[0, count)`.
    IndexOutOfRange {
        field: Cow<'static, str>,
        index: usize,
        count: usize,
    },
    /// At least one required field is unset (aggregated over all bitfield words).
    RequiredFieldsMissing {
        message: Cow<'static, str>,
        /// Namen aller fehlenden Required-Felder (Deklarationsreihenfolge).
        missing: Vec<String>,
    },
    /// A string field does not hold valid UTF-8.
    InvalidUtf8(Cow<'static, str>),
    /// Accessor used with a Rust type that does not match the field's kind.
    TypeMismatch {
        field: Cow<'static, str>,
        expected: &'static str,
        found: &'static str,
    },
    /// Field name or index does not exist in the message.
    UnknownField(Cow<'static, str>),
    /// Message or enum type name could not be resolved.
    UnknownType(Cow<'static, str>),
    /// Enum symbol is not part of the enum's value table.
    UnknownEnumValue {
        enum_name: Cow<'static, str>,
        value: Cow<'static, str>,
    },
    /// Nested messages exceed the configured recursion limit.
    RecursionLimitExceeded(usize),
    /// A buffer-backed value was read but the message retains no source buffer.
    MissingSourceBuffer,
    /// Two message instances of different types were combined (e.g. `copy_from`).
    LayoutMismatch {
        expected: Cow<'static, str>,
        found: Cow<'static, str>,
    },
    /// The schema model violates a structural rule.
    InvalidSchema(Cow<'static, str>),
    /// Two fields of one message share a field number.
    DuplicateFieldNumber { message: String, number: u32 },
    /// Field number is zero or above the protobuf maximum.
    InvalidFieldNumber { field: String, number: u32 },
    /// A declared default value does not fit the field's kind.
    InvalidDefault { field: String, reason: Cow<'static, str> },
    /// The JSON schema or message document could not be interpreted.
    SchemaJson(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedVarint => write!(f, "malformed varint: no terminating byte within the maximum group count"),
            Self::PrematureEndOfStream => write!(f, "premature end of stream"),
            Self::UnknownWireType(wt) => write!(f, "unknown wire type {wt}"),
            Self::InvalidTag(tag) => write!(f, "invalid tag {tag} (field number 0)"),
            Self::FieldNotSet(field) => write!(f, "field '{field}' is not set"),
            Self::IndexOutOfRange { field, index, count } => {
                write!(f, "index {index} is out of the list size ({count}) for field '{field}'")
            }
            Self::RequiredFieldsMissing { message, missing } => {
                if missing.is_empty() {
                    write!(f, "some required fields are missing in '{message}'")
                } else {
                    write!(f, "required fields missing in '{message}': {}", missing.join(", "))
                }
            }
            Self::InvalidUtf8(field) => write!(f, "field '{field}' does not contain valid UTF-8"),
            Self::TypeMismatch { field, expected, found } => {
                write!(f, "type mismatch on field '{field}': expected {expected}, found {found}")
            }
            Self::UnknownField(field) => write!(f, "unknown field '{field}'"),
            Self::UnknownType(name) => write!(f, "unknown type '{name}'"),
            Self::UnknownEnumValue { enum_name, value } => {
                write!(f, "'{value}' is not a value of enum '{enum_name}'")
            }
            Self::RecursionLimitExceeded(limit) => write!(f, "message nesting exceeds recursion limit {limit}"),
            Self::MissingSourceBuffer => write!(f, "buffer-backed field read without a retained source buffer"),
            Self::LayoutMismatch { expected, found } => {
                write!(f, "message type mismatch: expected '{expected}', found '{found}'")
            }
            Self::InvalidSchema(msg) => write!(f, "invalid schema: {msg}"),
            Self::DuplicateFieldNumber { message, number } => {
                write!(f, "duplicate field number {number} in message '{message}'")
            }
            Self::InvalidFieldNumber { field, number } => {
                write!(f, "invalid field number {number} for field '{field}'")
            }
            Self::InvalidDefault { field, reason } => write!(f, "invalid default for field '{field}': {reason}"),
            Self::SchemaJson(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `FieldNotSet` Fehler.
    pub fn field_not_set(field: impl Into<Cow<'static, str>>) -> Self {
        Self::FieldNotSet(field.into())
    }

    /// Erstellt einen `InvalidSchema` Fehler mit Nachricht.
    pub fn invalid_schema(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Erstellt einen `UnknownField` Fehler.
    pub fn unknown_field(field: impl Into<Cow<'static, str>>) -> Self {
        Self::UnknownField(field.into())
    }

    /// Erstellt einen `TypeMismatch` Fehler.
    pub fn type_mismatch(field: impl Into<Cow<'static, str>>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            found,
        }
    }

    /// Ob der Fehler aus dem Wire-Format stammt (und nicht aus API-Missbrauch).
    pub fn is_wire_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint
                | Self::PrematureEndOfStream
                | Self::UnknownWireType(_)
                | Self::InvalidTag(_)
                | Self::InvalidUtf8(_)
                | Self::RecursionLimitExceeded(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::SchemaJson(e.to_string())
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_varint_display() {
        let msg = Error::MalformedVarint.to_string();
        assert!(msg.contains("varint"), "{msg}");
    }

    #[test]
    fn field_not_set_display() {
        let msg = Error::field_not_set("name").to_string();
        assert_eq!(msg, "field 'name' is not set");
    }

    #[test]
    fn index_out_of_range_display() {
        let e = Error::IndexOutOfRange {
            field: "items".into(),
            index: 3,
            count: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("3"), "{msg}");
        assert!(msg.contains("(2)"), "{msg}");
        assert!(msg.contains("items"), "{msg}");
    }

    #[test]
    fn required_fields_missing_lists_all() {
        let e = Error::RequiredFieldsMissing {
            message: "Person".into(),
            missing: vec!["id".into(), "name".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("Person"), "{msg}");
        assert!(msg.contains("id, name"), "{msg}");
    }

    #[test]
    fn required_fields_missing_without_names() {
        let e = Error::RequiredFieldsMissing {
            message: "M".into(),
            missing: Vec::new(),
        };
        assert!(e.to_string().contains("some required fields are missing"));
    }

    #[test]
    fn unknown_wire_type_display() {
        let msg = Error::UnknownWireType(7).to_string();
        assert!(msg.contains('7'), "{msg}");
    }

    #[test]
    fn wire_error_classification() {
        assert!(Error::MalformedVarint.is_wire_error());
        assert!(Error::UnknownWireType(3).is_wire_error());
        assert!(!Error::field_not_set("a").is_wire_error());
        assert!(!Error::invalid_schema("x").is_wire_error());
    }

    #[test]
    fn json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: Error = err.into();
        assert!(matches!(e, Error::SchemaJson(_)));
    }
}
