//! JSON-Darstellung des Schema-Modells.
//!
//! Das textuelle `.proto`-Format wird außerhalb dieses Crates geparst; für
//! CLI und Tests gibt es dieses einfache JSON-Format:
//!
//! ```json
//! {
//!   "package": "demo",
//!   "enums": [{ "name": "Color", "values": [{ "name": "RED", "number": 0 }] }],
//!   "messages": [{
//!     "name": "Point",
//!     "fields": [
//!       { "name": "x", "number": 1, "type": "int32", "label": "required" },
//!       { "name": "tags", "number": 2, "type": "sint32", "label": "repeated", "packed": true },
//!       { "name": "c", "number": 3, "type": "Color", "default": "RED", "docs": ["Farbe"] }
//!     ],
//!     "enums": [],
//!     "messages": []
//!   }]
//! }
//! ```
//!
//! `label` fehlt ⇒ optional. Defaults sind JSON-Literale; Strings gelten bei
//! `string`/`bytes` Feldern als Wert, sonst als Bezeichner (Enum-Symbol,
//! `inf`, `-inf`, `nan`).

use serde_json::{Map, Value};

use crate::schema::{DefaultLiteral, EnumDecl, FieldDecl, FieldType, Label, MessageDecl, Schema};
use crate::{Error, Result};

/// Parses a schema document.
pub fn schema_from_str(json: &str) -> Result<Schema> {
    let value: Value = serde_json::from_str(json)?;
    schema_from_value(&value)
}

/// Interprets an already parsed JSON value as a schema document.
pub fn schema_from_value(value: &Value) -> Result<Schema> {
    let root = as_object(value, "schema")?;
    let package = match root.get("package") {
        None | Some(Value::Null) => None,
        Some(v) => Some(as_str(v, "package")?.to_string()),
    };
    Ok(Schema {
        package,
        messages: list(root, "messages", "schema")?
            .iter()
            .map(message_from_value)
            .collect::<Result<_>>()?,
        enums: list(root, "enums", "schema")?
            .iter()
            .map(enum_from_value)
            .collect::<Result<_>>()?,
    })
}

fn message_from_value(value: &Value) -> Result<MessageDecl> {
    let obj = as_object(value, "message")?;
    let name = required_str(obj, "name", "message")?;
    Ok(MessageDecl {
        fields: list(obj, "fields", name)?
            .iter()
            .map(|f| field_from_value(f, name))
            .collect::<Result<_>>()?,
        enums: list(obj, "enums", name)?
            .iter()
            .map(enum_from_value)
            .collect::<Result<_>>()?,
        messages: list(obj, "messages", name)?
            .iter()
            .map(message_from_value)
            .collect::<Result<_>>()?,
        name: name.to_string(),
    })
}

fn field_from_value(value: &Value, message: &str) -> Result<FieldDecl> {
    let obj = as_object(value, message)?;
    let name = required_str(obj, "name", message)?;
    let context = format!("{message}.{name}");

    let number = obj
        .get("number")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::SchemaJson(format!("{context}: 'number' must be an unsigned 32-bit integer")))?;
    let ty = FieldType::from_keyword(required_str(obj, "type", &context)?);
    let label = match obj.get("label").map(|v| as_str(v, &context)).transpose()? {
        None | Some("optional") => Label::Optional,
        Some("required") => Label::Required,
        Some("repeated") => Label::Repeated,
        Some(other) => return Err(Error::SchemaJson(format!("{context}: unknown label '{other}'"))),
    };

    let mut decl = FieldDecl::new(name, number, ty, label);
    decl.packed = match obj.get("packed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(Error::SchemaJson(format!("{context}: 'packed' must be a boolean"))),
    };
    decl.default = match obj.get("default") {
        None | Some(Value::Null) => None,
        Some(v) => Some(default_from_value(v, &decl.ty, &context)?),
    };
    decl.docs = match obj.get("docs") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(doc)) => vec![doc.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|d| as_str(d, &context).map(str::to_string))
            .collect::<Result<_>>()?,
        Some(_) => return Err(Error::SchemaJson(format!("{context}: 'docs' must be a string or list"))),
    };
    Ok(decl)
}

fn default_from_value(value: &Value, ty: &FieldType, context: &str) -> Result<DefaultLiteral> {
    Ok(match value {
        Value::Bool(b) => DefaultLiteral::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DefaultLiteral::Int(i)
            } else if let Some(u) = n.as_u64() {
                DefaultLiteral::Uint(u)
            } else {
                DefaultLiteral::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => match ty {
            FieldType::String => DefaultLiteral::Str(s.clone()),
            FieldType::Bytes => DefaultLiteral::Bytes(s.as_bytes().to_vec()),
            _ => DefaultLiteral::Ident(s.clone()),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => {
            return Err(Error::SchemaJson(format!("{context}: unsupported default literal")))
        }
    })
}

fn enum_from_value(value: &Value) -> Result<EnumDecl> {
    let obj = as_object(value, "enum")?;
    let name = required_str(obj, "name", "enum")?;
    let mut decl = EnumDecl::new(name);
    match obj.get("values") {
        // Liste bewahrt die Reihenfolge inkl. Aliase
        Some(Value::Array(items)) => {
            for item in items {
                let entry = as_object(item, name)?;
                let symbol = required_str(entry, "name", name)?;
                let number = enum_number(entry.get("number"), name, symbol)?;
                decl = decl.value(symbol, number);
            }
        }
        Some(Value::Object(map)) => {
            for (symbol, number) in map {
                decl = decl.value(symbol.as_str(), enum_number(Some(number), name, symbol)?);
            }
        }
        _ => return Err(Error::SchemaJson(format!("enum '{name}': 'values' must be a list or object"))),
    }
    Ok(decl)
}

fn enum_number(value: Option<&Value>, name: &str, symbol: &str) -> Result<i32> {
    value
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| Error::SchemaJson(format!("enum '{name}': value '{symbol}' needs a 32-bit number")))
}

fn as_object<'v>(value: &'v Value, context: &str) -> Result<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::SchemaJson(format!("{context}: expected an object")))
}

fn as_str<'v>(value: &'v Value, context: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| Error::SchemaJson(format!("{context}: expected a string")))
}

fn required_str<'v>(obj: &'v Map<String, Value>, key: &str, context: &str) -> Result<&'v str> {
    match obj.get(key) {
        Some(v) => as_str(v, context),
        None => Err(Error::SchemaJson(format!("{context}: missing '{key}'"))),
    }
}

/// Optional list member; absent or `null` is an empty list.
fn list<'v>(obj: &'v Map<String, Value>, key: &str, context: &str) -> Result<&'v [Value]> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::SchemaJson(format!("{context}: '{key}' must be a list"))),
    }
}
