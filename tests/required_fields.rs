//! Required-Felder, Defaults und unbekannte Felder.

use protolite::{schema_from_str, CompiledSchema, Error, WireWriter};
use std::sync::Arc;

include!("common/schemas.rs");

#[test]
fn serialize_rejects_missing_required() {
    let schema = compile(REQUIRED);
    let mut r = schema.new_message("R").unwrap();
    let mut writer = WireWriter::new();
    assert_eq!(
        r.serialize(&mut writer).unwrap_err(),
        Error::RequiredFieldsMissing {
            message: "R".into(),
            missing: vec!["a".to_string()],
        }
    );
    assert_eq!(writer.position(), 0);

    assert!(!r.has("a").unwrap());
    assert!(!r.has("b").unwrap());
    assert!(!r.has("c").unwrap());
    assert_eq!(r.get::<i32>("c").unwrap(), 5);

    r.set("a", 1i32).unwrap();
    assert!(r.has("a").unwrap());
    r.clear_field("a").unwrap();
    assert!(!r.has("a").unwrap());
    assert!(!r.is_initialized());
    r.set("a", 2i32).unwrap();
    assert!(r.is_initialized());

    assert_eq!(r.to_bytes().unwrap(), [0x08, 0x02]);
}

#[test]
fn parse_rejects_missing_required() {
    let schema = compile(REQUIRED);
    let mut nr = schema.new_message("NR").unwrap();
    nr.set("b", 3i32).unwrap();
    let bytes = nr.to_bytes().unwrap();

    let mut r = schema.new_message("R").unwrap();
    assert!(matches!(
        r.parse_bytes(&bytes).unwrap_err(),
        Error::RequiredFieldsMissing { ref missing, .. } if missing == &["a".to_string()]
    ));
}

#[test]
fn unknown_fields_are_skipped() {
    let schema = compile(REQUIRED);
    let mut ext = schema.new_message("RExt").unwrap();
    ext.set("a", 1i32)
        .unwrap()
        .set("b", 3i32)
        .unwrap()
        .set("ext_d", 10i32)
        .unwrap()
        .set("ext_e", 11u32)
        .unwrap()
        .set("ext_f", 111u64)
        .unwrap()
        .set_str("ext_g", "hello")
        .unwrap()
        .add("ext_h", -5i64)
        .unwrap();
    let bytes = ext.to_bytes().unwrap();

    let mut r = schema.new_message("R").unwrap();
    r.parse_bytes(&bytes).unwrap();
    assert_eq!(r.get::<i32>("a").unwrap(), 1);
    assert_eq!(r.get::<i32>("b").unwrap(), 3);
    assert!(!r.has("c").unwrap());

    // Unbekannte Felder werden nicht aufbewahrt
    let reencoded = r.to_bytes().unwrap();
    assert_eq!(reencoded, [0x08, 0x01, 0x10, 0x03]);
    assert!(reencoded.len() < bytes.len());
}

#[test]
fn error_lists_every_missing_field() {
    let doc = r#"{ "messages": [{ "name": "Many", "fields": [
        { "name": "f1", "number": 1, "type": "int32", "label": "required" },
        { "name": "o", "number": 2, "type": "int32" },
        { "name": "f3", "number": 3, "type": "string", "label": "required" },
        { "name": "f40", "number": 40, "type": "int32", "label": "required" }
    ] }] }"#;
    let schema = compile(doc);
    let mut m = schema.new_message("Many").unwrap();
    m.set_str("f3", "").unwrap();
    let err = m.to_bytes().unwrap_err();
    assert_eq!(err.to_string(), "required fields missing in 'Many': f1, f40");
}

#[test]
fn required_spanning_several_presence_words() {
    let fields: Vec<String> = (1..=70)
        .map(|n| {
            let label = if n % 7 == 0 { "required" } else { "optional" };
            format!(r#"{{ "name": "f{n}", "number": {n}, "type": "bool", "label": "{label}" }}"#)
        })
        .collect();
    let doc = format!(r#"{{ "messages": [{{ "name": "Wide", "fields": [{}] }}] }}"#, fields.join(","));
    let schema = compile(&doc);
    let layout = schema.layout_by_name("Wide").unwrap();
    assert_eq!(layout.presence().word_count(), 3);

    let mut m = schema.new_message("Wide").unwrap();
    for n in (7..=70).step_by(7) {
        assert!(!m.is_initialized());
        m.set(format!("f{n}").as_str(), true).unwrap();
    }
    assert!(m.is_initialized());
    let bytes = m.to_bytes().unwrap();
    // f7, f14: 1 Byte Tag; f21..f70: 2 Byte Tag
    assert_eq!(bytes.len(), 2 * 2 + 8 * 3);

    let mut parsed = schema.new_message("Wide").unwrap();
    parsed.parse_bytes(&bytes).unwrap();
    assert!(parsed.get::<bool>("f70").unwrap());
    assert!(!parsed.has("f69").unwrap());
}

#[test]
fn getter_without_default_fails() {
    let schema = compile(REQUIRED);
    let r = schema.new_message("R").unwrap();
    assert_eq!(r.get::<i32>("b").unwrap_err(), Error::FieldNotSet("b".into()));
    assert!(matches!(r.get::<i64>("c").unwrap_err(), Error::TypeMismatch { .. }));
}
