//! Chain parsing
//!
//! Turns the dot-chained suffix after a collection reference, such as
//! `find({status: "paid"}).sort({createdAt: -1}).limit(10)`, into an ordered
//! list of method calls with decoded arguments.

use mongodb::bson::Bson;

use crate::error::{ParseError, Result};

use super::args::parse_arguments;
use super::scanner::find_matching_paren;

/// A single `method(args)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub method: String,
    pub args: Vec<Bson>,
}

impl ParsedCall {
    /// Create a call from a method name and decoded arguments
    pub fn new(method: impl Into<String>, args: Vec<Bson>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Argument at `index`, if present
    pub fn arg(&self, index: usize) -> Option<&Bson> {
        self.args.get(index)
    }
}

/// Ordered calls applied to one collection, evaluated left to right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallChain {
    calls: Vec<ParsedCall>,
}

impl CallChain {
    /// Build a chain from already-parsed calls.
    pub fn new(calls: Vec<ParsedCall>) -> Self {
        Self { calls }
    }

    pub fn calls(&self) -> &[ParsedCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn first(&self) -> Option<&ParsedCall> {
        self.calls.first()
    }

    /// Method names in order, e.g. `["find", "sort", "limit"]`.
    pub fn methods(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.method.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a CallChain {
    type Item = &'a ParsedCall;
    type IntoIter = std::slice::Iter<'a, ParsedCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.iter()
    }
}

/// Parse a dot-chained call sequence.
///
/// # Errors
/// `InvalidCall` when a segment does not start with `identifier(`,
/// `UnbalancedDelimiters` when a call's parenthesis never closes, and any
/// error raised while decoding arguments.
pub fn parse_chain(input: &str) -> Result<CallChain> {
    let mut calls = Vec::new();
    let mut rest = input.trim();

    loop {
        let name_len = rest
            .char_indices()
            .find(|(i, c)| {
                !(c.is_ascii_alphabetic()
                    || *c == '_'
                    || *c == '$'
                    || (*i > 0 && c.is_ascii_digit()))
            })
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        if name_len == 0 {
            return Err(ParseError::InvalidCall(rest.to_string()).into());
        }
        let method = &rest[..name_len];

        let after_name = rest[name_len..].trim_start();
        if !after_name.starts_with('(') {
            return Err(ParseError::InvalidCall(rest.to_string()).into());
        }

        let close = find_matching_paren(after_name, 0)
            .ok_or_else(|| ParseError::UnbalancedDelimiters(rest.to_string()))?;

        let args = parse_arguments(&after_name[1..close])?;
        calls.push(ParsedCall::new(method, args));

        let after_call = after_name[close + 1..].trim_start();
        if after_call.is_empty() {
            break;
        }

        match after_call.strip_prefix('.') {
            Some(next) => rest = next.trim_start(),
            None => {
                return Err(ParseError::SyntaxError(format!(
                    "unexpected `{after_call}` after `{method}(...)`"
                ))
                .into());
            }
        }
    }

    Ok(CallChain::new(calls))
}
