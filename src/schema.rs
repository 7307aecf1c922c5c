//! Schema-Datenmodell (Eingabe des Compilers).
//!
//! Das textuelle Schema wird außerhalb dieses Crates geparst; hier liegt nur
//! das fertige Modell: geordnete Felder pro Message, verschachtelte Enums und
//! Messages. Die Reihenfolge der Felder bestimmt die Presence-Bits und die
//! Iterationsreihenfolge von `serialize`/`compute_size`.
//!
//! # Beispiel
//!
//! ```
//! use protolite::schema::{FieldDecl, FieldType, MessageDecl, Schema, DefaultLiteral};
//!
//! let schema = Schema::new().message(
//!     MessageDecl::new("Point")
//!         .field(FieldDecl::required("x", 1, FieldType::Int32))
//!         .field(FieldDecl::optional("y", 2, FieldType::Int32).with_default(DefaultLiteral::Int(5))),
//! );
//! assert_eq!(schema.messages[0].fields.len(), 2);
//! ```

/// Declared type of a field: a scalar keyword or a named enum/message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Double,
    Float,
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
    Bool,
    String,
    Bytes,
    /// Enum or message type, resolved against the enclosing scopes.
    Named(String),
}

impl FieldType {
    /// Parses a scalar keyword; anything else becomes a named type reference.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            other => Self::Named(other.to_string()),
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
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
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Named(name) => name,
        }
    }
}

/// Cardinality and requiredness in one: `required` only exists for singular fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// Default value literal as written in the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultLiteral {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Enum-Symbol (z.B. `default = BLUE`).
    Ident(String),
}

/// One field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub number: u32,
    pub ty: FieldType,
    pub label: Label,
    /// Packed-Encoding angefordert (nur für repeated numeric/enum/bool gültig).
    pub packed: bool,
    pub default: Option<DefaultLiteral>,
    /// Kommentare aus dem Schema, nur für Ausgaben wie `protolite plan`.
    pub docs: Vec<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, number: u32, ty: FieldType, label: Label) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
            label,
            packed: false,
            default: None,
            docs: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self::new(name, number, ty, Label::Optional)
    }

    pub fn required(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self::new(name, number, ty, Label::Required)
    }

    pub fn repeated(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self::new(name, number, ty, Label::Repeated)
    }

    #[must_use]
    pub fn with_default(mut self, default: DefaultLiteral) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.docs.push(doc.into());
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }
}

/// Enum declaration: ordered `name → number` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

impl EnumDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }
}

/// Message declaration with its nested scopes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub enums: Vec<EnumDecl>,
    pub messages: Vec<MessageDecl>,
}

impl MessageDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn nested_enum(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }

    #[must_use]
    pub fn nested_message(mut self, decl: MessageDecl) -> Self {
        self.messages.push(decl);
        self
    }
}

/// A whole schema file: top-level messages and enums.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub package: Option<String>,
    pub messages: Vec<MessageDecl>,
    pub enums: Vec<EnumDecl>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    #[must_use]
    pub fn message(mut self, decl: MessageDecl) -> Self {
        self.messages.push(decl);
        self
    }

    #[must_use]
    pub fn enumeration(mut self, decl: EnumDecl) -> Self {
        self.enums.push(decl);
        self
    }
}
