//! JSON rendering and ingest of message instances.
//!
//! Abbildung (angelehnt an das proto3 JSON-Mapping, aber ohne Namens-
//! umschreibung): Feldnamen wie im Schema, Enums als Symbol (unbekannte
//! Nummern als Zahl), Bytes als Base64 (Standard-Alphabet), 64-Bit Integer
//! als JSON-Zahl, nicht-endliche Floats als `"NaN"`, `"Infinity"`,
//! `"-Infinity"`. Nicht gesetzte singuläre und leere repeated Felder fehlen.

use base64::Engine;
use serde_json::{Map, Number, Value};

use crate::field::{FieldIdx, FieldPlan, FieldVariant, NumericKind, Scalar};
use crate::message::{EnumValue, Message};
use crate::{Error, Result};

/// Renders every present field of `message` as a JSON object.
pub fn to_json(message: &Message<'_>) -> Result<Value> {
    let mut map = Map::new();
    for plan in message.layout().fields() {
        let idx = plan.index();
        if !message.has(idx)? {
            continue;
        }
        let value = match plan.variant() {
            FieldVariant::Scalar(NumericKind::Enum(_)) => enum_to_json(message.get_enum(idx)?),
            FieldVariant::Scalar(_) => scalar_to_json(message.get_scalar(idx)?),
            FieldVariant::String => Value::String(message.get_str(idx)?.to_string()),
            FieldVariant::Bytes => bytes_to_json(message.get_bytes(idx)?),
            FieldVariant::Message(_) => to_json(message.get_message(idx)?)?,
            FieldVariant::RepeatedScalar { kind, .. } => {
                let count = message.count(idx)?;
                let items = (0..count)
                    .map(|i| match kind {
                        NumericKind::Enum(_) => message.get_enum_at(idx, i).map(enum_to_json),
                        _ => message.get_scalar_at(idx, i).map(scalar_to_json),
                    })
                    .collect::<Result<_>>()?;
                Value::Array(items)
            }
            FieldVariant::RepeatedString => Value::Array(
                (0..message.count(idx)?)
                    .map(|i| message.get_str_at(idx, i).map(|s| Value::String(s.to_string())))
                    .collect::<Result<_>>()?,
            ),
            FieldVariant::RepeatedBytes => Value::Array(
                (0..message.count(idx)?)
                    .map(|i| message.get_bytes_at(idx, i).map(bytes_to_json))
                    .collect::<Result<_>>()?,
            ),
            FieldVariant::RepeatedMessage(_) => Value::Array(
                (0..message.count(idx)?)
                    .map(|i| message.get_message_at(idx, i).and_then(to_json))
                    .collect::<Result<_>>()?,
            ),
        };
        map.insert(plan.name().to_string(), value);
    }
    Ok(Value::Object(map))
}

/// Sets the fields named in `value` on `message` (merge semantics).
pub fn from_json(message: &mut Message<'_>, value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::SchemaJson(format!("'{}': expected an object", message.type_name())))?;
    for (key, item) in obj {
        let idx = message.field_index(key)?;
        let plan = message.layout().fields()[idx.index()].clone();
        if item.is_null() {
            continue;
        }
        match plan.variant() {
            FieldVariant::Scalar(NumericKind::Enum(_)) => set_enum(message, idx, item, &plan)?,
            FieldVariant::Scalar(kind) => {
                message.set_scalar(idx, scalar_from_json(kind, item, &plan)?)?;
            }
            FieldVariant::String => {
                message.set_str(idx, text(item, &plan)?)?;
            }
            FieldVariant::Bytes => {
                message.set_bytes(idx, bytes_from_json(item, &plan)?)?;
            }
            FieldVariant::Message(_) => from_json(message.mutable_message(idx)?, item)?,
            FieldVariant::RepeatedScalar { kind, .. } => {
                for element in array(item, &plan)? {
                    match kind {
                        NumericKind::Enum(_) => add_enum(message, idx, element, &plan)?,
                        _ => {
                            message.add_scalar(idx, scalar_from_json(kind, element, &plan)?)?;
                        }
                    }
                }
            }
            FieldVariant::RepeatedString => {
                for element in array(item, &plan)? {
                    message.add_str(idx, text(element, &plan)?)?;
                }
            }
            FieldVariant::RepeatedBytes => {
                for element in array(item, &plan)? {
                    message.add_bytes(idx, bytes_from_json(element, &plan)?)?;
                }
            }
            FieldVariant::RepeatedMessage(_) => {
                for element in array(item, &plan)? {
                    from_json(message.add_message(idx)?, element)?;
                }
            }
        }
    }
    Ok(())
}

fn scalar_to_json(value: Scalar) -> Value {
    match value {
        Scalar::Bool(b) => Value::Bool(b),
        Scalar::I32(v) => Value::from(v),
        Scalar::I64(v) => Value::from(v),
        Scalar::U32(v) => Value::from(v),
        Scalar::U64(v) => Value::from(v),
        Scalar::F32(v) => float_to_json(f64::from(v)),
        Scalar::F64(v) => float_to_json(v),
    }
}

fn float_to_json(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None if v.is_nan() => Value::String("NaN".into()),
        None if v > 0.0 => Value::String("Infinity".into()),
        None => Value::String("-Infinity".into()),
    }
}

fn enum_to_json(value: EnumValue<'_>) -> Value {
    match value {
        EnumValue::Known { name, .. } => Value::String(name.to_string()),
        EnumValue::Unrecognized(number) => Value::from(number),
    }
}

fn bytes_to_json(bytes: &[u8]) -> Value {
    Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn mismatch(plan: &FieldPlan, expected: &str) -> Error {
    Error::SchemaJson(format!("field '{}': expected {expected}", plan.name()))
}

fn scalar_from_json(kind: NumericKind, value: &Value, plan: &FieldPlan) -> Result<Scalar> {
    use NumericKind::*;
    let scalar = match kind {
        Bool => value.as_bool().map(Scalar::Bool),
        Int32 | Sint32 | Sfixed32 | Enum(_) => value.as_i64().and_then(|v| i32::try_from(v).ok()).map(Scalar::I32),
        Int64 | Sint64 | Sfixed64 => value.as_i64().map(Scalar::I64),
        Uint32 | Fixed32 => value.as_u64().and_then(|v| u32::try_from(v).ok()).map(Scalar::U32),
        Uint64 | Fixed64 => value.as_u64().map(Scalar::U64),
        Float => float_from_json(value).map(|v| Scalar::F32(v as f32)),
        Double => float_from_json(value).map(Scalar::F64),
    };
    scalar.ok_or_else(|| mismatch(plan, kind.keyword()))
}

fn float_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => value.as_f64(),
    }
}

fn set_enum(message: &mut Message<'_>, idx: FieldIdx, value: &Value, plan: &FieldPlan) -> Result<()> {
    match value {
        Value::String(symbol) => message.set_enum(idx, symbol)?,
        _ => {
            let number = value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| mismatch(plan, "enum symbol or number"))?;
            message.set_enum_number(idx, number)?
        }
    };
    Ok(())
}

fn add_enum(message: &mut Message<'_>, idx: FieldIdx, value: &Value, plan: &FieldPlan) -> Result<()> {
    match value {
        Value::String(symbol) => message.add_enum(idx, symbol)?,
        _ => {
            let number = value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| mismatch(plan, "enum symbol or number"))?;
            message.add_scalar(idx, Scalar::I32(number))?
        }
    };
    Ok(())
}

fn text<'v>(value: &'v Value, plan: &FieldPlan) -> Result<&'v str> {
    value.as_str().ok_or_else(|| mismatch(plan, "string"))
}

fn bytes_from_json(value: &Value, plan: &FieldPlan) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text(value, plan)?)
        .map_err(|e| Error::SchemaJson(format!("field '{}': invalid base64: {e}", plan.name())))
}

fn array<'v>(value: &'v Value, plan: &FieldPlan) -> Result<&'v [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| mismatch(plan, "array"))
}
