//! Extended-type decoding
//!
//! Converts generic JSON values into BSON, materializing Extended JSON
//! sentinel wrappers as native values:
//!
//! | Sentinel                            | BSON                 |
//! |-------------------------------------|----------------------|
//! | `{"$oid": "<24 hex>"}`              | `ObjectId`           |
//! | `{"$date": "<iso>"}`                | `DateTime`           |
//! | `{"$date": {"$numberLong": "<ms>"}}`| `DateTime`           |
//! | `{"$numberInt": ..}`                | `Int32`              |
//! | `{"$numberLong": ..}`               | `Int64`              |
//! | `{"$numberDouble": ..}`             | `Double`             |
//! | `{"$numberDecimal": ..}`            | `Double`             |
//!
//! Two passes exist. [`decode_extended`] recognizes every sentinel above and
//! serves the document-editing surface, which receives Extended JSON text.
//! [`decode_object_ids`] recognizes only `{"$oid": ...}` and serves chain-call
//! arguments, where identifiers are the only extended type written literally.

use chrono::{DateTime as ChronoDateTime, NaiveDate, NaiveDateTime};
use mongodb::bson::{Bson, Document, oid::ObjectId};
use serde_json::{Map, Value as JsonValue};

use crate::error::{ParseError, Result};

/// A decoded sentinel wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtendedValue {
    ObjectId(ObjectId),
    DateTime(bson::DateTime),
    Int32(i32),
    Int64(i64),
    Double(f64),
}

impl ExtendedValue {
    /// Recognize a sentinel map.
    ///
    /// Keys are checked in a fixed order: `$date`, `$oid`, `$numberInt` /
    /// `$numberLong`, then `$numberDouble` / `$numberDecimal`. Returns
    /// `Ok(None)` for plain maps.
    pub fn from_map(map: &Map<String, JsonValue>) -> Result<Option<Self>> {
        if let Some(value) = map.get("$date") {
            return decode_date(value).map(|dt| Some(ExtendedValue::DateTime(dt)));
        }
        if let Some(value) = map.get("$oid") {
            return decode_oid_value(value).map(|oid| Some(ExtendedValue::ObjectId(oid)));
        }
        if let Some(value) = map.get("$numberInt") {
            let n = integer_payload("$numberInt", value)?;
            let n = i32::try_from(n).map_err(|_| {
                ParseError::InvalidExtendedJson(format!("$numberInt out of range: {n}"))
            })?;
            return Ok(Some(ExtendedValue::Int32(n)));
        }
        if let Some(value) = map.get("$numberLong") {
            return integer_payload("$numberLong", value).map(|n| Some(ExtendedValue::Int64(n)));
        }
        for key in ["$numberDouble", "$numberDecimal"] {
            if let Some(value) = map.get(key) {
                return float_payload(key, value).map(|f| Some(ExtendedValue::Double(f)));
            }
        }
        Ok(None)
    }
}

impl From<ExtendedValue> for Bson {
    fn from(value: ExtendedValue) -> Self {
        match value {
            ExtendedValue::ObjectId(oid) => Bson::ObjectId(oid),
            ExtendedValue::DateTime(dt) => Bson::DateTime(dt),
            ExtendedValue::Int32(n) => Bson::Int32(n),
            ExtendedValue::Int64(n) => Bson::Int64(n),
            ExtendedValue::Double(f) => Bson::Double(f),
        }
    }
}

/// Decode a JSON value, materializing every supported sentinel.
pub fn decode_extended(value: JsonValue) -> Result<Bson> {
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(decode_extended)
            .collect::<Result<Vec<_>>>()
            .map(Bson::Array),
        JsonValue::Object(map) => match ExtendedValue::from_map(&map)? {
            Some(extended) => Ok(extended.into()),
            None => decode_map(map, decode_extended).map(Bson::Document),
        },
        other => Ok(scalar_to_bson(other)),
    }
}

/// Decode a JSON value, materializing only `{"$oid": "<hex>"}` wrappers.
///
/// Other sentinel shapes stay plain documents, so `{"$date": "..."}` reaches
/// the store as a sub-document with a `$date` key.
pub fn decode_object_ids(value: JsonValue) -> Result<Bson> {
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(decode_object_ids)
            .collect::<Result<Vec<_>>>()
            .map(Bson::Array),
        JsonValue::Object(map) => {
            if map.len() == 1 {
                if let Some(JsonValue::String(hex)) = map.get("$oid") {
                    return parse_object_id(hex).map(Bson::ObjectId);
                }
            }
            decode_map(map, decode_object_ids).map(Bson::Document)
        }
        other => Ok(scalar_to_bson(other)),
    }
}

/// Parse Extended JSON text from a document editor into a BSON document.
///
/// # Errors
/// `InvalidLiteral` if the text is not JSON, `InvalidExtendedJson` if the
/// top-level value is not an object or a sentinel payload is malformed.
pub fn parse_extended_document(text: &str) -> Result<Document> {
    let value: JsonValue = serde_json::from_str(text).map_err(|e| ParseError::InvalidLiteral {
        fragment: text.trim().to_string(),
        reason: e.to_string(),
    })?;

    match decode_extended(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(ParseError::InvalidExtendedJson(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))
        .into()),
    }
}

/// Parse a 24-character hexadecimal identifier.
///
/// Anything else fails; input is never truncated or padded.
pub fn parse_object_id(hex_str: &str) -> Result<ObjectId> {
    if hex_str.len() != 24 {
        return Err(ParseError::InvalidObjectId(hex_str.to_string()).into());
    }

    let bytes: [u8; 12] = hex::decode(hex_str)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ParseError::InvalidObjectId(hex_str.to_string()))?;

    Ok(ObjectId::from_bytes(bytes))
}

/// Convert a JSON number to the narrowest fitting BSON number.
pub(crate) fn number_to_bson(n: &serde_json::Number) -> Bson {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        }
    } else {
        Bson::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn decode_map(
    map: Map<String, JsonValue>,
    decode: fn(JsonValue) -> Result<Bson>,
) -> Result<Document> {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key, decode(value)?);
    }
    Ok(doc)
}

fn scalar_to_bson(value: JsonValue) -> Bson {
    match value {
        JsonValue::Null => Bson::Null,
        JsonValue::Bool(b) => Bson::Boolean(b),
        JsonValue::Number(n) => number_to_bson(&n),
        JsonValue::String(s) => Bson::String(s),
        // Containers are handled by the callers
        JsonValue::Array(_) | JsonValue::Object(_) => Bson::Null,
    }
}

fn decode_oid_value(value: &JsonValue) -> Result<ObjectId> {
    match value {
        JsonValue::String(hex) => parse_object_id(hex),
        other => Err(ParseError::InvalidObjectId(other.to_string()).into()),
    }
}

fn decode_date(value: &JsonValue) -> Result<bson::DateTime> {
    match value {
        JsonValue::String(s) => parse_timestamp(s),
        JsonValue::Object(inner) if inner.contains_key("$numberLong") => {
            let millis = integer_payload("$numberLong", &inner["$numberLong"])?;
            Ok(bson::DateTime::from_millis(millis))
        }
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(bson::DateTime::from_millis)
            .ok_or_else(|| ParseError::InvalidExtendedJson(format!("invalid $date: {n}")).into()),
        other => Err(ParseError::InvalidExtendedJson(format!("invalid $date: {other}")).into()),
    }
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (UTC)
/// or a bare `YYYY-MM-DD` date.
fn parse_timestamp(text: &str) -> Result<bson::DateTime> {
    let millis = ChronoDateTime::parse_from_rfc3339(text)
        .map(|dt| dt.timestamp_millis())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.and_utc().timestamp_millis())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| {
                d.and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp_millis())
                    .unwrap_or_default()
            })
        })
        .map_err(|_| ParseError::InvalidExtendedJson(format!("invalid $date: {text}")))?;

    Ok(bson::DateTime::from_millis(millis))
}

fn integer_payload(key: &str, value: &JsonValue) -> Result<i64> {
    let parsed = match value {
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        JsonValue::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.ok_or_else(|| ParseError::InvalidExtendedJson(format!("invalid {key}: {value}")).into())
}

fn float_payload(key: &str, value: &JsonValue) -> Result<f64> {
    let parsed = match value {
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| ParseError::InvalidExtendedJson(format!("invalid {key}: {value}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use mongodb::bson::doc;
    use serde_json::json;

    const HEX: &str = "65a1b2c3d4e5f60718293a4b";

    #[test]
    fn test_parse_object_id() {
        let oid = parse_object_id(HEX).unwrap();
        assert_eq!(oid, ObjectId::parse_str(HEX).unwrap());
        assert_eq!(oid.to_hex(), HEX);
    }

    #[test]
    fn test_parse_object_id_rejects_bad_input() {
        for bad in ["", "65a1b2c3", "65a1b2c3d4e5f60718293a4bff", "zza1b2c3d4e5f60718293a4b"] {
            let err = parse_object_id(bad).unwrap_err();
            assert!(matches!(err, ConsoleError::Parse(ParseError::InvalidObjectId(_))));
        }
    }

    #[test]
    fn test_full_decoder_sentinels() {
        let value = json!({
            "_id": { "$oid": HEX },
            "at": { "$date": "2024-01-15T10:30:00Z" },
            "legacy": { "$date": { "$numberLong": "1705314600000" } },
            "small": { "$numberInt": "7" },
            "big": { "$numberLong": "9007199254740993" },
            "ratio": { "$numberDouble": "0.25" },
            "price": { "$numberDecimal": "19.99" },
        });

        let decoded = decode_extended(value).unwrap();
        let doc = decoded.as_document().unwrap();

        assert_eq!(doc.get_object_id("_id").unwrap().to_hex(), HEX);
        assert_eq!(doc.get_datetime("at").unwrap().timestamp_millis(), 1705314600000);
        assert_eq!(doc.get_datetime("legacy").unwrap().timestamp_millis(), 1705314600000);
        assert_eq!(doc.get_i32("small").unwrap(), 7);
        assert_eq!(doc.get_i64("big").unwrap(), 9007199254740993);
        assert_eq!(doc.get_f64("ratio").unwrap(), 0.25);
        assert_eq!(doc.get_f64("price").unwrap(), 19.99);
    }

    #[test]
    fn test_full_decoder_recurses_through_arrays() {
        let decoded = decode_extended(json!([{ "ids": [{ "$oid": HEX }] }, null])).unwrap();
        let expected = Bson::Array(vec![
            Bson::Document(doc! { "ids": [ObjectId::parse_str(HEX).unwrap()] }),
            Bson::Null,
        ]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_full_decoder_date_forms() {
        let day = decode_extended(json!({ "$date": "2024-01-15" })).unwrap();
        assert_eq!(
            day,
            Bson::DateTime(bson::DateTime::from_millis(1705276800000))
        );

        let millis = decode_extended(json!({ "$date": 0 })).unwrap();
        assert_eq!(millis, Bson::DateTime(bson::DateTime::from_millis(0)));

        assert!(decode_extended(json!({ "$date": "yesterday" })).is_err());
        assert!(decode_extended(json!({ "$date": true })).is_err());
    }

    #[test]
    fn test_full_decoder_invalid_oid_is_error() {
        let err = decode_extended(json!({ "$oid": "1234" })).unwrap_err();
        assert!(matches!(err, ConsoleError::Parse(ParseError::InvalidObjectId(_))));
    }

    #[test]
    fn test_narrow_decoder_only_handles_oid() {
        let decoded = decode_object_ids(json!({
            "_id": { "$oid": HEX },
            "at": { "$date": "2024-01-15T10:30:00Z" },
            "n": { "$numberLong": "5" },
        }))
        .unwrap();
        let doc = decoded.as_document().unwrap();

        assert_eq!(doc.get_object_id("_id").unwrap().to_hex(), HEX);
        assert_eq!(
            doc.get_document("at").unwrap(),
            &doc! { "$date": "2024-01-15T10:30:00Z" }
        );
        assert_eq!(doc.get_document("n").unwrap(), &doc! { "$numberLong": "5" });
    }

    #[test]
    fn test_narrow_decoder_invalid_hex_fails() {
        let err = decode_object_ids(json!({ "_id": { "$oid": "not-hex" } })).unwrap_err();
        assert!(matches!(err, ConsoleError::Parse(ParseError::InvalidObjectId(_))));
    }

    #[test]
    fn test_numbers_use_narrowest_type() {
        assert_eq!(decode_object_ids(json!(5)).unwrap(), Bson::Int32(5));
        assert_eq!(
            decode_object_ids(json!(5_000_000_000i64)).unwrap(),
            Bson::Int64(5_000_000_000)
        );
        assert_eq!(decode_object_ids(json!(1.5)).unwrap(), Bson::Double(1.5));
    }

    #[test]
    fn test_parse_extended_document() {
        let doc =
            parse_extended_document(&format!(r#"{{"_id": {{"$oid": "{HEX}"}}, "n": 1}}"#)).unwrap();
        assert_eq!(doc.get_object_id("_id").unwrap().to_hex(), HEX);
        assert_eq!(doc.get_i32("n").unwrap(), 1);

        assert!(parse_extended_document("[1, 2]").is_err());
        assert!(parse_extended_document("{oops").is_err());
    }
}
