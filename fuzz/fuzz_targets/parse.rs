#![no_main]
use libfuzzer_sys::fuzz_target;
use protolite::{schema_from_str, CompiledSchema};

const SCHEMA: &str = r#"{
    "messages": [{
        "name": "Node",
        "fields": [
            { "name": "value", "number": 1, "type": "sint64" },
            { "name": "label", "number": 2, "type": "string" },
            { "name": "next", "number": 3, "type": "Node" },
            { "name": "children", "number": 4, "type": "Node", "label": "repeated" },
            { "name": "packed", "number": 5, "type": "int32", "label": "repeated", "packed": true },
            { "name": "blob", "number": 6, "type": "bytes" },
            { "name": "ratio", "number": 7, "type": "double" },
            { "name": "id", "number": 8, "type": "fixed32", "label": "required" }
        ]
    }]
}"#;

fuzz_target!(|data: &[u8]| {
    let Ok(schema) = schema_from_str(SCHEMA).and_then(|s| CompiledSchema::compile(&s)) else {
        return;
    };
    let Ok(mut message) = schema.new_message("Node") else {
        return;
    };
    if message.parse_bytes(data).is_ok() {
        // Lazy-UTF-8 und Zugriff auf geparste Felder dürfen nicht paniken
        let _ = message.get_str("label");
        let _ = message.compute_size();
        let _ = protolite::json::to_json(&message);
    }
});
