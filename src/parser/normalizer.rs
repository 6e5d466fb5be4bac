//! Relaxed object-literal normalization
//!
//! Shell users write filters the way they would in JavaScript:
//!
//! ```text
//! { status: 'paid', $or: [{ qty: { $gt: 5 } }], _id: ObjectId("65a1...") }
//! ```
//!
//! This module turns that into strict JSON in a single left-to-right pass.
//! Outside string literals, unquoted keys that follow `{`, `,` or `[` are
//! wrapped in double quotes and `ObjectId("...")` calls become
//! `{"$oid": "..."}` wrappers. Single-quoted strings are rewritten as
//! double-quoted strings; string content is otherwise copied untouched.
//!
//! Only string content is escaped, not interpreted: JavaScript escapes such as
//! `\x41` are passed through to the JSON parser as-is.

use serde_json::Value as JsonValue;

use crate::error::{ParseError, Result};

/// Name of the only constructor recognized inside literals
pub const OBJECT_ID_CONSTRUCTOR: &str = "ObjectId";

/// Normalize a relaxed literal into a strict JSON string.
///
/// The output is not validated; use [`parse_relaxed`] to also parse it.
pub fn normalize(input: &str) -> String {
    let mut output = String::with_capacity(input.len() + 16);
    let mut last_significant: Option<char> = None;
    let mut pos = 0;

    while let Some(ch) = input[pos..].chars().next() {
        let rest = &input[pos..];

        if ch == '"' || ch == '\'' {
            pos += copy_string(rest, &mut output);
            last_significant = Some('"');
            continue;
        }

        if is_identifier_start(ch) && !input[..pos].ends_with(is_identifier_char) {
            if let Some((consumed, content)) = match_object_id_call(rest) {
                let encoded = JsonValue::String(content).to_string();
                output.push_str(&format!("{{\"$oid\":{encoded}}}"));
                last_significant = Some('}');
                pos += consumed;
                continue;
            }

            if matches!(last_significant, Some('{' | ',' | '[')) {
                let word_len = rest
                    .find(|c: char| !is_identifier_char(c))
                    .unwrap_or(rest.len());
                let word = &rest[..word_len];

                if rest[word_len..].trim_start().starts_with(':') {
                    output.push('"');
                    output.push_str(word);
                    output.push('"');
                } else {
                    output.push_str(word);
                }
                last_significant = word.chars().last();
                pos += word_len;
                continue;
            }
        }

        if !ch.is_whitespace() {
            last_significant = Some(ch);
        }
        output.push(ch);
        pos += ch.len_utf8();
    }

    output
}

/// Normalize and strictly parse a relaxed literal.
///
/// # Errors
/// `ParseError::InvalidLiteral` naming the original fragment when the
/// normalized text is not valid JSON.
pub fn parse_relaxed(input: &str) -> Result<JsonValue> {
    let normalized = normalize(input);
    serde_json::from_str(&normalized).map_err(|e| {
        ParseError::InvalidLiteral {
            fragment: input.trim().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Match `ObjectId ( <quote>content<quote> )` at the start of `text`.
///
/// Returns the byte length of the whole call and the quoted content.
fn match_object_id_call(text: &str) -> Option<(usize, String)> {
    let after_name = text.strip_prefix(OBJECT_ID_CONSTRUCTOR)?;
    let after_paren = after_name.trim_start().strip_prefix('(')?;
    let inner = after_paren.trim_start();

    let quote = inner.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &inner[1..];
    let end = body.find(quote)?;
    let content = body[..end].to_string();

    let after_string = body[end + 1..].trim_start();
    let after_call = after_string.strip_prefix(')')?;

    Some((text.len() - after_call.len(), content))
}

/// Copy the string literal at the start of `text` into `output` as a
/// double-quoted string. Returns the byte length consumed, closing quote
/// included.
///
/// An unterminated string is copied to the end unchanged apart from its
/// opening quote; the strict parser reports it.
fn copy_string(text: &str, output: &mut String) -> usize {
    let mut chars = text.char_indices();
    let Some((_, quote)) = chars.next() else {
        return 0;
    };
    output.push('"');

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                // `\'` needs no escape in a double-quoted string
                Some((_, '\'')) if quote == '\'' => output.push('\''),
                Some((_, next)) => {
                    output.push('\\');
                    output.push(next);
                }
                None => output.push('\\'),
            },
            c if c == quote => {
                output.push('"');
                return idx + c.len_utf8();
            }
            '"' => output.push_str("\\\""),
            c => output.push(c),
        }
    }

    text.len()
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}
