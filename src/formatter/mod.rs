//! Output rendering for command results
//!
//! Results are converted to plain JSON (see [`bson_utils`]) and rendered as:
//! - compact single-line JSON, suitable for piping
//! - pretty-printed JSON with configurable indentation, optionally colored

pub mod bson_utils;

use colored_json::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::OutputFormat;
use crate::error::{ConsoleError, Result};
use crate::executor::ExecutionResult;

/// Renders execution results and errors as text
#[derive(Debug, Clone)]
pub struct Formatter {
    /// Output format type
    format: OutputFormat,

    /// Enable colored output (pretty output only)
    use_colors: bool,

    /// Indentation width for pretty output
    indent: usize,
}

impl Formatter {
    /// Create a new formatter
    pub fn new(format: OutputFormat, use_colors: bool) -> Self {
        Self {
            format,
            use_colors,
            indent: 2,
        }
    }

    /// Set the indentation width used by pretty output
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn format_type(&self) -> OutputFormat {
        self.format
    }

    /// Render a successful result
    pub fn format(&self, result: &ExecutionResult) -> Result<String> {
        self.render(&result.to_json())
    }

    /// Render an error as its JSON envelope.
    ///
    /// Never fails; falls back to the plain message if rendering does.
    pub fn format_error(&self, error: &ConsoleError) -> String {
        self.render(&error.to_json())
            .unwrap_or_else(|_| error.to_string())
    }

    fn render(&self, value: &JsonValue) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(value).map_err(render_error),
            OutputFormat::JsonPretty => {
                let text = self.to_pretty_string(value).map_err(render_error)?;
                // Compact output stays uncolored for piping/logging
                if self.use_colors {
                    Ok(text.to_colored_json_auto().unwrap_or(text))
                } else {
                    Ok(text)
                }
            }
        }
    }

    fn to_pretty_string<T: Serialize>(
        &self,
        value: &T,
    ) -> std::result::Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        // serde_json only ever writes UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::JsonPretty, false)
    }
}

fn render_error(err: serde_json::Error) -> ConsoleError {
    ConsoleError::Generic(format!("Failed to render output: {err}"))
}
