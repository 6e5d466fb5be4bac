//! Command and literal parsing for the console
//!
//! # Architecture
//!
//! The parser is split into small modules, leaves first:
//! - `scanner`: bracket and string-aware scanning shared by everything below
//! - `normalizer`: relaxed JS-style literals to strict JSON
//! - `extended`: Extended JSON sentinels (`$oid`, `$date`, ...) to BSON
//! - `args`: call arguments to decoded BSON values
//! - `chain`: `find(...).sort(...).limit(...)` to an ordered call list
//! - `command`: top-level command shapes (`show dbs`, `use`, `db.<...>`)
//!
//! # Examples
//!
//! ```
//! use mongo_console::parser::{Command, CommandParser};
//!
//! let cmd = CommandParser::parse("db.shop.users.find({ age: { $gt: 18 } })", None).unwrap();
//! assert!(matches!(cmd, Command::Chain { .. }));
//!
//! let cmd = CommandParser::parse("show dbs", None).unwrap();
//! assert_eq!(cmd, Command::ShowDatabases);
//! ```

mod args;
mod chain;
mod command;
mod extended;
mod normalizer;
mod scanner;

pub use args::{decode_argument, parse_arguments};
pub use chain::{CallChain, ParsedCall, parse_chain};
pub use command::{Command, CommandParser, help_message};
pub use extended::{ExtendedValue, decode_extended, decode_object_ids, parse_extended_document};
pub use normalizer::{normalize, parse_relaxed};
pub use scanner::{ScanState, Scanner, split_top_level};
