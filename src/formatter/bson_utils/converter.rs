//! Core converter traits for BSON value conversion

use mongodb::bson::{Binary, Bson, DateTime, Decimal128, Document, Regex, Timestamp, oid::ObjectId};
use serde_json::Value as JsonValue;

/// Core trait for BSON value conversion
pub trait BsonConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert a BSON document
    fn convert_document(&self, doc: &Document) -> Self::Output;
}

/// Per-type hooks for converters producing JSON values.
///
/// Scalars with a native JSON form are handled by the provided
/// [`convert_to_json`](BsonJsonConverter::convert_to_json); everything else
/// is delegated to the hooks.
pub trait BsonJsonConverter {
    fn convert_object_id(&self, oid: &ObjectId) -> JsonValue;
    fn convert_datetime(&self, dt: &DateTime) -> JsonValue;
    fn convert_decimal128(&self, d: &Decimal128) -> JsonValue;
    fn convert_binary(&self, bin: &Binary) -> JsonValue;
    fn convert_regex(&self, regex: &Regex) -> JsonValue;
    fn convert_timestamp(&self, ts: &Timestamp) -> JsonValue;

    /// Convert an array element-wise
    fn convert_array(&self, arr: &[Bson]) -> JsonValue {
        JsonValue::Array(arr.iter().map(|v| self.convert_to_json(v)).collect())
    }

    /// Convert a document field by field, recursing into nested values
    fn convert_document_to_json(&self, doc: &Document) -> JsonValue {
        let map = doc
            .iter()
            .map(|(key, value)| (key.clone(), self.convert_to_json(value)))
            .collect();
        JsonValue::Object(map)
    }

    /// Convert BSON value to JSON (provided implementation)
    fn convert_to_json(&self, value: &Bson) -> JsonValue {
        match value {
            Bson::String(s) => JsonValue::String(s.clone()),
            Bson::Int32(n) => JsonValue::Number((*n).into()),
            Bson::Int64(n) => JsonValue::Number((*n).into()),
            Bson::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Bson::Boolean(b) => JsonValue::Bool(*b),
            Bson::Null | Bson::Undefined => JsonValue::Null,
            Bson::ObjectId(oid) => self.convert_object_id(oid),
            Bson::DateTime(dt) => self.convert_datetime(dt),
            Bson::Decimal128(d) => self.convert_decimal128(d),
            Bson::Array(arr) => self.convert_array(arr),
            Bson::Document(doc) => self.convert_document_to_json(doc),
            Bson::Binary(bin) => self.convert_binary(bin),
            Bson::RegularExpression(regex) => self.convert_regex(regex),
            Bson::Timestamp(ts) => self.convert_timestamp(ts),
            Bson::Symbol(s) => JsonValue::String(s.clone()),
            Bson::JavaScriptCode(code) => JsonValue::String(code.clone()),
            Bson::MinKey => JsonValue::String("MinKey".to_string()),
            Bson::MaxKey => JsonValue::String("MaxKey".to_string()),
            _ => JsonValue::String(format!("{value:?}")),
        }
    }
}
