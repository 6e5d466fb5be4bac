//! BSON value conversion utilities
//!
//! Converters implement [`BsonConverter`]; JSON-producing converters get the
//! recursive walk for free from [`BsonJsonConverter`] and only supply the
//! per-type hooks for non-JSON types.

mod converter;
mod helpers;
mod json;

pub use converter::{BsonConverter, BsonJsonConverter};
pub use helpers::{datetime_to_iso_string, id_to_text};
pub use json::JsonConverter;

#[cfg(test)]
mod tests;
