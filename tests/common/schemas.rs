// Gemeinsame Test-Schemas für die Integrationstests.
//
// Wird per `include!` eingebunden. Benötigte Imports:
//   use std::sync::Arc;
//   use protolite::{schema_from_str, CompiledSchema};

/// Adressbuch wie im klassischen protobuf-Beispiel.
#[allow(dead_code)]
const ADDRESS_BOOK: &str = r#"{
    "package": "tutorial",
    "messages": [
        {
            "name": "Person",
            "fields": [
                { "name": "name", "number": 1, "type": "string", "label": "required" },
                { "name": "id", "number": 2, "type": "int32", "label": "required" },
                { "name": "email", "number": 3, "type": "string" },
                { "name": "phone", "number": 4, "type": "PhoneNumber", "label": "repeated" }
            ],
            "enums": [
                { "name": "PhoneType", "values": [
                    { "name": "MOBILE", "number": 0 },
                    { "name": "HOME", "number": 1 },
                    { "name": "WORK", "number": 2 }
                ] }
            ],
            "messages": [
                {
                    "name": "PhoneNumber",
                    "fields": [
                        { "name": "number", "number": 1, "type": "string", "label": "required" },
                        { "name": "type", "number": 2, "type": "PhoneType", "default": "HOME" }
                    ]
                }
            ]
        },
        {
            "name": "AddressBook",
            "fields": [
                { "name": "person", "number": 1, "type": "Person", "label": "repeated" }
            ]
        }
    ]
}"#;

/// Required-Semantik: `R` verlangt `a`, `NR` ist dieselbe Nachricht ohne
/// Pflichtfelder, `RExt` ergänzt Felder, die `R` nicht kennt.
#[allow(dead_code)]
const REQUIRED: &str = r#"{
    "messages": [
        { "name": "R", "fields": [
            { "name": "a", "number": 1, "type": "int32", "label": "required" },
            { "name": "b", "number": 2, "type": "int32" },
            { "name": "c", "number": 3, "type": "int32", "default": 5 }
        ] },
        { "name": "NR", "fields": [
            { "name": "a", "number": 1, "type": "int32" },
            { "name": "b", "number": 2, "type": "int32" }
        ] },
        { "name": "RExt", "fields": [
            { "name": "a", "number": 1, "type": "int32", "label": "required" },
            { "name": "b", "number": 2, "type": "int32" },
            { "name": "ext_d", "number": 4, "type": "int32" },
            { "name": "ext_e", "number": 5, "type": "fixed32" },
            { "name": "ext_f", "number": 6, "type": "fixed64" },
            { "name": "ext_g", "number": 7, "type": "string" },
            { "name": "ext_h", "number": 8, "type": "sint64", "label": "repeated", "packed": true }
        ] }
    ]
}"#;

/// Ein Feld pro skalarer Art, plus repeated Varianten.
#[allow(dead_code)]
const SCALARS: &str = r#"{
    "enums": [
        { "name": "Level", "values": [
            { "name": "LOW", "number": 0 },
            { "name": "HIGH", "number": 1 },
            { "name": "NEGATIVE", "number": -1 }
        ] }
    ],
    "messages": [
        { "name": "Numbers", "fields": [
            { "name": "f_int32", "number": 1, "type": "int32" },
            { "name": "f_int64", "number": 2, "type": "int64" },
            { "name": "f_uint32", "number": 3, "type": "uint32" },
            { "name": "f_uint64", "number": 4, "type": "uint64" },
            { "name": "f_sint32", "number": 5, "type": "sint32" },
            { "name": "f_sint64", "number": 6, "type": "sint64" },
            { "name": "f_fixed32", "number": 7, "type": "fixed32" },
            { "name": "f_fixed64", "number": 8, "type": "fixed64" },
            { "name": "f_sfixed32", "number": 9, "type": "sfixed32" },
            { "name": "f_sfixed64", "number": 10, "type": "sfixed64" },
            { "name": "f_float", "number": 11, "type": "float" },
            { "name": "f_double", "number": 12, "type": "double" },
            { "name": "f_bool", "number": 13, "type": "bool" },
            { "name": "f_level", "number": 14, "type": "Level" },
            { "name": "f_string", "number": 15, "type": "string" },
            { "name": "f_bytes", "number": 16, "type": "bytes" }
        ] },
        { "name": "Lists", "fields": [
            { "name": "packed", "number": 4, "type": "int32", "label": "repeated", "packed": true },
            { "name": "unpacked", "number": 5, "type": "int32", "label": "repeated" },
            { "name": "doubles", "number": 6, "type": "double", "label": "repeated", "packed": true },
            { "name": "levels", "number": 7, "type": "Level", "label": "repeated" },
            { "name": "names", "number": 8, "type": "string", "label": "repeated" },
            { "name": "blobs", "number": 9, "type": "bytes", "label": "repeated" },
            { "name": "flags", "number": 10, "type": "bool", "label": "repeated", "packed": true }
        ] }
    ]
}"#;

/// Kleine Nachrichten für die Bytevektoren aus der Formatbeschreibung.
#[allow(dead_code)]
const VECTORS: &str = r#"{
    "messages": [
        { "name": "Test1", "fields": [ { "name": "a", "number": 1, "type": "int32" } ] },
        { "name": "Test2", "fields": [ { "name": "b", "number": 2, "type": "string" } ] },
        { "name": "Test3", "fields": [ { "name": "c", "number": 3, "type": "Test1" } ] },
        { "name": "Test4", "fields": [ { "name": "d", "number": 4, "type": "int32", "label": "repeated", "packed": true } ] },
        { "name": "Test4u", "fields": [ { "name": "d", "number": 4, "type": "int32", "label": "repeated" } ] },
        { "name": "Test5", "fields": [ { "name": "e", "number": 5, "type": "fixed32" } ] },
        { "name": "Test6", "fields": [ { "name": "f", "number": 6, "type": "double" } ] },
        { "name": "Node", "fields": [
            { "name": "value", "number": 1, "type": "int32" },
            { "name": "label", "number": 2, "type": "string" },
            { "name": "next", "number": 3, "type": "Node" },
            { "name": "children", "number": 4, "type": "Node", "label": "repeated" }
        ] }
    ]
}"#;

#[allow(dead_code)]
fn compile(doc: &str) -> Arc<CompiledSchema> {
    CompiledSchema::compile(&schema_from_str(doc).unwrap()).unwrap()
}
