//! protolite – schema-driven, Protocol Buffers compatible wire codec
//!
//! Ein Schema wird einmal zu einem [`CompiledSchema`] kompiliert: pro Feld
//! eine geschlossene Variante mit vorberechneten Tags und Presence-Bit. Die
//! Laufzeit-Instanzen ([`Message`]) parsen Strings und Bytes ohne Kopie und
//! materialisieren sie erst beim ersten Lesen.
//!
//! # Beispiel
//!
//! ```
//! use protolite::{CompiledSchema, WireReader};
//! use protolite::schema::{FieldDecl, FieldType, MessageDecl, Schema};
//!
//! let schema = CompiledSchema::compile(&Schema::new().message(
//!     MessageDecl::new("Greeting")
//!         .field(FieldDecl::required("id", 1, FieldType::Int32))
//!         .field(FieldDecl::optional("text", 2, FieldType::String)),
//! ))
//! .unwrap();
//!
//! // Encode
//! let mut greeting = schema.new_message("Greeting").unwrap();
//! greeting.set("id", 1i32).unwrap().set_str("text", "hi").unwrap();
//! let bytes = greeting.to_bytes().unwrap();
//! assert_eq!(bytes, [0x08, 0x01, 0x12, 0x02, b'h', b'i']);
//!
//! // Decode
//! let mut decoded = schema.new_message("Greeting").unwrap();
//! let mut reader = WireReader::new(&bytes);
//! decoded.parse_from(&mut reader, bytes.len()).unwrap();
//! assert_eq!(decoded.get_str("text").unwrap(), "hi");
//! ```

pub mod bytestream;
pub mod deferred;
pub mod error;
pub mod field;
pub mod fixed;
pub mod json;
pub mod layout;
pub mod message;
pub mod options;
pub mod presence;
pub mod schema;
pub mod schema_json;
pub mod varint;
pub mod wire_type;
pub mod zigzag;

pub use error::{Error, Result};

/// HashMap mit ahash für die Dispatch-Tabellen (Tag → Feld, Name → Feld).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexMap mit ahash: Registries mit stabiler Reihenfolge (Index = Id).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Buffer
pub use bytestream::{WireReader, WireWriter};

// Public API: Schema & Compile
pub use layout::{CompiledSchema, EnumLayout, MessageLayout};
pub use options::CompileOptions;
pub use schema_json::schema_from_str;

// Public API: Messages
pub use field::{FieldIdx, FieldVariant, Scalar, ScalarType};
pub use message::{EnumValue, FieldRef, Message, MessageState};
