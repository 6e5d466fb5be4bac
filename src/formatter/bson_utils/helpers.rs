//! Helper functions for BSON value conversion

use mongodb::bson::{Binary, Bson, DateTime};

/// Convert DateTime to an RFC 3339 string, falling back to epoch millis
/// for dates outside the representable range.
pub fn datetime_to_iso_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| format!("{}", dt.timestamp_millis()))
}

/// Convert Binary data to hexadecimal string
pub fn binary_to_hex(bin: &Binary) -> String {
    hex::encode(&bin.bytes)
}

/// Textual form of a document identifier.
///
/// ObjectIds become their 24-character hex, strings stay as they are and
/// anything else uses its relaxed Extended JSON rendering.
pub fn id_to_text(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}
