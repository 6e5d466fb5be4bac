//! Simplified JSON conversion
//!
//! Extended types are flattened into plain JSON so results read naturally
//! and can be piped into other tools:
//! - ObjectId: 24-character hex string
//! - DateTime: RFC 3339 string
//! - Decimal128: string, to keep full precision
//! - Int32/Int64/Double: JSON numbers

use mongodb::bson::{Binary, Bson, DateTime, Decimal128, Document, Regex, Timestamp, oid::ObjectId};
use serde_json::Value as JsonValue;

use super::converter::{BsonConverter, BsonJsonConverter};
use super::helpers::{binary_to_hex, datetime_to_iso_string};

/// BSON to plain JSON converter
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert a list of documents into a JSON array
    pub fn convert_documents(&self, docs: &[Document]) -> JsonValue {
        JsonValue::Array(docs.iter().map(|doc| self.convert_document(doc)).collect())
    }
}

impl BsonConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &Bson) -> JsonValue {
        self.convert_to_json(value)
    }

    fn convert_document(&self, doc: &Document) -> JsonValue {
        self.convert_document_to_json(doc)
    }
}

impl BsonJsonConverter for JsonConverter {
    fn convert_object_id(&self, oid: &ObjectId) -> JsonValue {
        JsonValue::String(oid.to_hex())
    }

    fn convert_datetime(&self, dt: &DateTime) -> JsonValue {
        JsonValue::String(datetime_to_iso_string(dt))
    }

    fn convert_decimal128(&self, d: &Decimal128) -> JsonValue {
        JsonValue::String(d.to_string())
    }

    fn convert_binary(&self, bin: &Binary) -> JsonValue {
        JsonValue::String(binary_to_hex(bin))
    }

    fn convert_regex(&self, regex: &Regex) -> JsonValue {
        JsonValue::String(format!("/{}/{}", regex.pattern, regex.options))
    }

    fn convert_timestamp(&self, ts: &Timestamp) -> JsonValue {
        serde_json::json!({ "t": ts.time, "i": ts.increment })
    }
}
