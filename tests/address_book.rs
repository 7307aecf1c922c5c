//! Adressbuch: verschachtelte repeated Messages, Enums mit Default,
//! byte-genauer Vergleich mit der protobuf-Referenzkodierung.

use protolite::{schema_from_str, CompiledSchema, EnumValue, Message, WireReader};
use std::sync::Arc;

include!("common/schemas.rs");

fn build_book(schema: &Arc<CompiledSchema>) -> Message<'static> {
    let mut book = schema.new_message("AddressBook").unwrap();

    let p1 = book.add_message("person").unwrap();
    p1.set_str("name", "name 1")
        .unwrap()
        .set_str("email", "name1@example.com")
        .unwrap()
        .set("id", 5i32)
        .unwrap();
    p1.add_message("phone")
        .unwrap()
        .set_str("number", "xxx-zzz-1111")
        .unwrap()
        .set_enum("type", "HOME")
        .unwrap();
    p1.add_message("phone")
        .unwrap()
        .set_str("number", "xxx-zzz-2222")
        .unwrap()
        .set_enum("type", "MOBILE")
        .unwrap();

    let p2 = book.add_message("person").unwrap();
    p2.set_str("name", "name 2")
        .unwrap()
        .set_str("email", "name2@example.com")
        .unwrap()
        .set("id", 6i32)
        .unwrap();
    p2.add_message("phone")
        .unwrap()
        .set_str("number", "xxx-zzz-2222")
        .unwrap()
        .set_enum("type", "HOME")
        .unwrap();
    book
}

#[test]
fn build_and_read_back() {
    let schema = compile(ADDRESS_BOOK);
    let book = build_book(&schema);

    assert_eq!(book.count("person").unwrap(), 2);
    let p1 = book.get_message_at("person", 0).unwrap();
    assert_eq!(p1.get_str("name").unwrap(), "name 1");
    assert_eq!(p1.get_str("email").unwrap(), "name1@example.com");
    assert_eq!(p1.get::<i32>("id").unwrap(), 5);
    let phone = p1.get_message_at("phone", 0).unwrap();
    assert_eq!(phone.get_str("number").unwrap(), "xxx-zzz-1111");
    assert_eq!(phone.get_enum("type").unwrap().name(), Some("HOME"));
    assert_eq!(p1.get_message_at("phone", 1).unwrap().get_enum("type").unwrap().number(), 0);
}

#[test]
fn matches_reference_encoding() {
    let schema = compile(ADDRESS_BOOK);
    let mut book = schema.new_message("AddressBook").unwrap();
    let person = book.add_message("person").unwrap();
    person.set_str("name", "a").unwrap().set("id", 5i32).unwrap();
    person
        .add_message("phone")
        .unwrap()
        .set_str("number", "1")
        .unwrap()
        .set_enum("type", "HOME")
        .unwrap();

    let person_bytes = [
        0x0a, 0x01, b'a', // name
        0x10, 0x05, // id
        0x22, 0x05, 0x0a, 0x01, b'1', 0x10, 0x01, // phone
    ];
    let mut expected = vec![0x0a, person_bytes.len() as u8];
    expected.extend_from_slice(&person_bytes);

    assert_eq!(book.compute_size(), expected.len());
    assert_eq!(book.to_bytes().unwrap(), expected);
}

#[test]
fn serialized_size_matches_output() {
    let schema = compile(ADDRESS_BOOK);
    let book = build_book(&schema);
    let bytes = book.to_bytes().unwrap();
    assert_eq!(book.compute_size(), bytes.len());
}

#[test]
fn parse_round_trip() {
    let schema = compile(ADDRESS_BOOK);
    let book = build_book(&schema);
    let bytes = book.to_bytes().unwrap();

    let mut parsed = schema.new_message("tutorial.AddressBook").unwrap();
    let mut reader = WireReader::new(&bytes);
    parsed.parse_from(&mut reader, bytes.len()).unwrap();

    assert_eq!(parsed, book);
    assert_eq!(parsed.count("person").unwrap(), 2);
    let p2 = parsed.get_message_at("person", 1).unwrap();
    assert_eq!(p2.get_str("name").unwrap(), "name 2");
    assert_eq!(p2.get_str("email").unwrap(), "name2@example.com");
    assert_eq!(p2.get::<i32>("id").unwrap(), 6);
    assert_eq!(
        p2.get_message_at("phone", 0).unwrap().get_enum("type").unwrap(),
        EnumValue::Known {
            name: "HOME",
            number: 1
        }
    );
    // Re-Serialisierung aus den Buffer-Referenzen ist byte-identisch
    assert_eq!(parsed.to_bytes().unwrap(), bytes);
}

#[test]
fn enum_default_when_unset() {
    let schema = compile(ADDRESS_BOOK);
    let mut phone = schema.new_message("Person.PhoneNumber").unwrap();
    assert!(!phone.has("type").unwrap());
    assert_eq!(phone.get_enum("type").unwrap().name(), Some("HOME"));
    phone.set_str("number", "x").unwrap();
    // Default wird nicht serialisiert
    assert_eq!(phone.to_bytes().unwrap(), [0x0a, 0x01, b'x']);
}
