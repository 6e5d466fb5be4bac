//! Argument tokenization for chain calls
//!
//! Splits the text between a call's parentheses into top-level arguments and
//! decodes each one into a BSON value.

use mongodb::bson::Bson;
use serde_json::Value as JsonValue;

use crate::error::{ParseError, Result};

use super::extended::{decode_object_ids, number_to_bson};
use super::normalizer::{OBJECT_ID_CONSTRUCTOR, normalize, parse_relaxed};
use super::scanner::{Scanner, check_balanced, split_top_level};

/// Parse the inside of `method(...)` into decoded arguments.
///
/// A sole array argument (`aggregate([...])`) is kept whole as one array.
/// A trailing comma is tolerated; an empty argument between commas is not.
pub fn parse_arguments(inner: &str) -> Result<Vec<Bson>> {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') && spans_single_array(trimmed) {
        return Ok(vec![decode_argument(trimmed)?]);
    }

    let mut pieces = split_top_level(trimmed, ',')?;
    if pieces.len() > 1 && pieces.last().is_some_and(|p| p.trim().is_empty()) {
        pieces.pop();
    }

    pieces.into_iter().map(decode_argument).collect()
}

/// Decode a single argument fragment.
///
/// Accepted forms: object/array literals, quoted strings, numbers, `true`,
/// `false`, `null` and `ObjectId("<hex>")`.
pub fn decode_argument(fragment: &str) -> Result<Bson> {
    let text = fragment.trim();

    if text.is_empty() {
        return Err(ParseError::SyntaxError("empty argument".to_string()).into());
    }

    if text.starts_with('{') || text.starts_with('[') {
        check_balanced(text)?;
        return decode_object_ids(parse_relaxed(text)?);
    }

    if text.starts_with('"') || text.starts_with('\'') {
        return decode_string(text);
    }

    match text {
        "true" => return Ok(Bson::Boolean(true)),
        "false" => return Ok(Bson::Boolean(false)),
        "null" => return Ok(Bson::Null),
        _ => {}
    }

    if let Ok(JsonValue::Number(n)) = serde_json::from_str::<JsonValue>(text) {
        return Ok(number_to_bson(&n));
    }

    if text.starts_with(OBJECT_ID_CONSTRUCTOR) {
        let value: JsonValue = serde_json::from_str(&normalize(text))
            .map_err(|_| ParseError::InvalidObjectId(text.to_string()))?;
        return decode_object_ids(value);
    }

    Err(ParseError::InvalidLiteral {
        fragment: text.to_string(),
        reason: "expected an object, array, string, number, boolean, null or ObjectId(...)"
            .to_string(),
    }
    .into())
}

/// True if the `[` at the start of `text` closes at the very end.
fn spans_single_array(text: &str) -> bool {
    Scanner::new(text)
        .find(|(_, _, state)| state.is_top_level())
        .is_some_and(|(idx, ch, _)| ch == ']' && idx + 1 == text.len())
}

fn decode_string(text: &str) -> Result<Bson> {
    check_balanced(text)?;
    match serde_json::from_str::<JsonValue>(&normalize(text)) {
        Ok(JsonValue::String(s)) => Ok(Bson::String(s)),
        _ => Err(ParseError::InvalidLiteral {
            fragment: text.to_string(),
            reason: "expected a single string literal".to_string(),
        }
        .into()),
    }
}
