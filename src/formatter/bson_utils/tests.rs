//! Conversion tests for BSON utilities

use super::*;
use mongodb::bson::{
    Binary, Bson, DateTime, Decimal128, Regex, Timestamp, doc, oid::ObjectId, spec::BinarySubtype,
};
use serde_json::{Value as JsonValue, json};

fn oid() -> ObjectId {
    ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap()
}

#[test]
fn test_scalars() {
    let converter = JsonConverter::new();
    assert_eq!(converter.convert(&Bson::String("x".into())), json!("x"));
    assert_eq!(converter.convert(&Bson::Int32(42)), json!(42));
    assert_eq!(converter.convert(&Bson::Int64(1 << 40)), json!(1_099_511_627_776_i64));
    assert_eq!(converter.convert(&Bson::Double(2.5)), json!(2.5));
    assert_eq!(converter.convert(&Bson::Boolean(true)), json!(true));
    assert_eq!(converter.convert(&Bson::Null), JsonValue::Null);
}

#[test]
fn test_non_finite_double_is_null() {
    let converter = JsonConverter::new();
    assert_eq!(converter.convert(&Bson::Double(f64::NAN)), JsonValue::Null);
}

#[test]
fn test_object_id_is_hex() {
    let converter = JsonConverter::new();
    assert_eq!(
        converter.convert(&Bson::ObjectId(oid())),
        json!("65705d84dfc3f3b5094e1f72")
    );
}

#[test]
fn test_datetime_is_rfc3339() {
    let converter = JsonConverter::new();
    let value = converter.convert(&Bson::DateTime(DateTime::from_millis(1_701_862_788_373)));
    assert_eq!(value, json!("2023-12-06T11:39:48.373Z"));
}

#[test]
fn test_decimal_keeps_precision() {
    let converter = JsonConverter::new();
    let d: Decimal128 = "12345678901234567890.123".parse().unwrap();
    assert_eq!(
        converter.convert(&Bson::Decimal128(d)),
        json!("12345678901234567890.123")
    );
}

#[test]
fn test_other_types() {
    let converter = JsonConverter::new();
    let bin = Binary {
        subtype: BinarySubtype::Generic,
        bytes: vec![0xde, 0xad],
    };
    assert_eq!(converter.convert(&Bson::Binary(bin)), json!("dead"));

    let regex = Regex {
        pattern: "^a".to_string(),
        options: "i".to_string(),
    };
    assert_eq!(converter.convert(&Bson::RegularExpression(regex)), json!("/^a/i"));

    let ts = Timestamp {
        time: 10,
        increment: 2,
    };
    assert_eq!(converter.convert(&Bson::Timestamp(ts)), json!({ "t": 10, "i": 2 }));
}

#[test]
fn test_nested_identifiers_are_converted() {
    let converter = JsonConverter::new();
    let document = doc! {
        "_id": oid(),
        "owner": { "ref": oid(), "tags": ["a", { "inner": oid() }] },
        "history": [oid()],
    };

    let value = converter.convert_document(&document);
    assert_eq!(
        value,
        json!({
            "_id": "65705d84dfc3f3b5094e1f72",
            "owner": {
                "ref": "65705d84dfc3f3b5094e1f72",
                "tags": ["a", { "inner": "65705d84dfc3f3b5094e1f72" }]
            },
            "history": ["65705d84dfc3f3b5094e1f72"]
        })
    );
    assert!(!value.to_string().contains("$oid"));
}

#[test]
fn test_convert_documents() {
    let converter = JsonConverter::new();
    let value = converter.convert_documents(&[doc! { "a": 1 }, doc! { "b": 2 }]);
    assert_eq!(value, json!([{ "a": 1 }, { "b": 2 }]));
}
