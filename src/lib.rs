//! mongo-console library
//!
//! The command interpreter behind a MongoDB administrative console. It accepts
//! one line of mongosh-style input, parses it into a structured command and
//! runs it against a document store.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `executor`: Command routing and call-chain execution
//! - `formatter`: BSON to JSON conversion and output rendering
//! - `parser`: Relaxed literals, extended types, arguments and call chains
//! - `store`: Document store abstraction with MongoDB and in-memory backends
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mongo_console::{CommandRouter, MemoryStore, ReadOnlyFlag};
//!
//! # tokio_test::block_on(async {
//! let router = CommandRouter::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ReadOnlyFlag::new(false)),
//! );
//!
//! router.execute("db.shop.users.insertOne({name: 'Ana'})", None).await?;
//! let result = router.execute("db.users.find({name: 'Ana'})", Some("shop")).await?;
//! assert_eq!(result.to_json()["count"], 1);
//! # Ok::<(), mongo_console::ConsoleError>(())
//! # }).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod parser;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConsoleError, Result};
pub use executor::{CommandRouter, ExecutionResult, ReadOnlyFlag, ResultData};
pub use formatter::Formatter;
pub use parser::{Command, CommandParser};
pub use store::{DocumentStore, MemoryStore, MongoStore, Namespace};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
