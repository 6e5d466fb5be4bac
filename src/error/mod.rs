//! Error handling for the console interpreter.
//!
//! Errors fall into four classes that callers are expected to treat
//! differently:
//! - `Parse`: malformed literal, unbalanced brackets, bad identifier hex,
//!   invalid call syntax. Surfaced verbatim with the offending fragment.
//! - `Usage`: unsupported method or wrong argument shape. Surfaced with the
//!   supported alternatives.
//! - `Policy`: mutating call while read-only. Rejected before the store is
//!   contacted.
//! - `Store`: anything the store raises, passed through with its message.
//!
//! # Example
//!
//! ```rust
//! use mongo_console::error::{ConsoleError, ParseError};
//!
//! let err: ConsoleError = ParseError::EmptyInput.into();
//! assert_eq!(err.kind(), "parse");
//! ```

pub mod kinds;
pub mod store;

// Re-export commonly used types
pub use kinds::{
    ConfigError, ConsoleError, ParseError, PolicyError, Result, StoreError, UsageError,
};
pub use store::{ErrorDetails, ErrorInfo};
