//! Bracket- and string-aware scanning
//!
//! One state machine shared by the argument tokenizer, the chain parser and
//! the command-reference splitter. It walks a string character by character
//! and reports, after each character, how deeply nested the scan is and
//! whether it is inside a string literal.
//!
//! Quote characters (`"` and `'`) open a string only outside of one; inside a
//! string only the same quote character closes it, and only when it is not
//! escaped by a preceding backslash. Brackets inside strings are ignored.

use std::str::CharIndices;

use crate::error::{ParseError, Result};

/// Nesting state of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    /// Open `(` count
    pub parens: usize,
    /// Open `[` count
    pub brackets: usize,
    /// Open `{` count
    pub braces: usize,
    /// Quote character of the string literal being scanned, if any
    pub quote: Option<char>,
}

impl ScanState {
    /// Combined depth of all bracket kinds.
    pub fn depth(&self) -> usize {
        self.parens + self.brackets + self.braces
    }

    /// True while inside a string literal.
    pub fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    /// True when neither nested nor inside a string.
    pub fn is_top_level(&self) -> bool {
        self.depth() == 0 && !self.in_string()
    }
}

/// Character-level scanner over a string slice.
///
/// Yields `(byte_index, char, state_after_char)`. A closing quote yields a
/// state that is no longer in-string; a closing bracket yields the reduced
/// depth.
pub struct Scanner<'a> {
    chars: CharIndices<'a>,
    state: ScanState,
    escaped: bool,
    underflow: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices(),
            state: ScanState::default(),
            escaped: false,
            underflow: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// True if a closer without a matching opener was seen.
    pub fn underflowed(&self) -> bool {
        self.underflow
    }

    /// Feed one character and return the resulting state.
    pub fn step(&mut self, ch: char) -> ScanState {
        if let Some(quote) = self.state.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == quote {
                self.state.quote = None;
            }
            return self.state;
        }

        match ch {
            '"' | '\'' => self.state.quote = Some(ch),
            '(' => self.state.parens += 1,
            '[' => self.state.brackets += 1,
            '{' => self.state.braces += 1,
            ')' => self.close(|s| &mut s.parens),
            ']' => self.close(|s| &mut s.brackets),
            '}' => self.close(|s| &mut s.braces),
            _ => {}
        }
        self.state
    }

    fn close(&mut self, counter: fn(&mut ScanState) -> &mut usize) {
        let count = counter(&mut self.state);
        if *count == 0 {
            self.underflow = true;
        } else {
            *count -= 1;
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = (usize, char, ScanState);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, ch) = self.chars.next()?;
        let state = self.step(ch);
        Some((idx, ch, state))
    }
}

/// Split `input` at every top-level occurrence of `separator`.
///
/// Separators inside brackets, braces, parens or string literals are kept as
/// part of the surrounding piece. Pieces are returned untrimmed.
///
/// # Errors
/// `UnterminatedLiteral` if a string or bracket is still open at the end,
/// `UnbalancedDelimiters` if a closer appears without an opener.
pub fn split_top_level(input: &str, separator: char) -> Result<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut scanner = Scanner::new(input);

    while let Some((idx, ch, state)) = scanner.next() {
        if ch == separator && state.is_top_level() {
            pieces.push(&input[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    ensure_closed(input, &scanner)?;

    pieces.push(&input[start..]);
    Ok(pieces)
}

/// Find the `)` matching the `(` at byte offset `open`.
///
/// Only parentheses gate the match; brackets and braces are tracked but a
/// stray `}` does not stop the search. String literals are skipped.
pub fn find_matching_paren(input: &str, open: usize) -> Option<usize> {
    let rest = input.get(open..)?;
    if !rest.starts_with('(') {
        return None;
    }

    Scanner::new(rest)
        .find(|(_, ch, state)| *ch == ')' && state.parens == 0 && !state.in_string())
        .map(|(idx, _, _)| open + idx)
}

/// Check that every bracket and string in `fragment` is closed.
pub fn check_balanced(fragment: &str) -> Result<()> {
    let mut scanner = Scanner::new(fragment);
    scanner.by_ref().for_each(drop);
    ensure_closed(fragment, &scanner)
}

fn ensure_closed(input: &str, scanner: &Scanner<'_>) -> Result<()> {
    if scanner.underflowed() {
        return Err(ParseError::UnbalancedDelimiters(input.trim().to_string()).into());
    }
    if !scanner.state().is_top_level() {
        return Err(ParseError::UnterminatedLiteral(input.trim().to_string()).into());
    }
    Ok(())
}
