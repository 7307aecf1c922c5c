#![no_main]
use libfuzzer_sys::fuzz_target;
use protolite::{schema_from_str, CompiledSchema};

const SCHEMA: &str = r#"{
    "messages": [{
        "name": "Node",
        "fields": [
            { "name": "value", "number": 1, "type": "int64" },
            { "name": "label", "number": 2, "type": "string" },
            { "name": "next", "number": 3, "type": "Node" },
            { "name": "children", "number": 4, "type": "Node", "label": "repeated" },
            { "name": "packed", "number": 5, "type": "uint32", "label": "repeated", "packed": true },
            { "name": "flags", "number": 6, "type": "bool", "label": "repeated" },
            { "name": "ratio", "number": 7, "type": "float" }
        ]
    }]
}"#;

fuzz_target!(|data: &[u8]| {
    let Ok(schema) = schema_from_str(SCHEMA).and_then(|s| CompiledSchema::compile(&s)) else {
        return;
    };
    let Ok(mut first) = schema.new_message("Node") else {
        return;
    };
    if first.parse_bytes(data).is_err() {
        return;
    }
    let Ok(encoded) = first.to_bytes() else {
        return;
    };
    assert_eq!(encoded.len(), first.compute_size());

    let mut second = schema.new_message("Node").expect("known type");
    second.parse_bytes(&encoded).expect("re-parse of own output");
    assert_eq!(first, second);

    // Kanonische Form ist ein Fixpunkt
    let again = second.to_bytes().expect("re-encode");
    assert_eq!(again, encoded);
});
