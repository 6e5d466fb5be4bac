//! Command execution engine
//!
//! This module runs parsed commands against a [`DocumentStore`](crate::store::DocumentStore):
//! - `router`: parses a line and dispatches it, recording timing
//! - `admin`: database listing, collection listing and `use`
//! - `query`: the call-chain executor (cursor operations and terminals)
//! - `policy`: read-only enforcement for mutating operations
//! - `result`: result shapes and their JSON serialization
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use mongo_console::executor::{CommandRouter, ReadOnlyFlag};
//! use mongo_console::store::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let router = CommandRouter::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ReadOnlyFlag::new(false)),
//! );
//! let result = router
//!     .execute("db.shop.users.insertOne({name: 'Ana'})", None)
//!     .await
//!     .unwrap();
//! assert_eq!(result.stats.documents_affected, Some(1));
//! # });
//! ```

pub mod admin;
pub mod policy;
pub mod query;
pub mod result;
pub mod router;

pub use admin::{AdminExecutor, SYSTEM_DATABASES};
pub use policy::{MUTATING_METHODS, ReadOnlyFlag, ReadOnlyPolicy, is_mutating};
pub use query::{CURSOR_METHODS, QueryExecutor, SUPPORTED_OPERATIONS};
pub use result::{ExecutionResult, ExecutionStats, ResultData};
pub use router::CommandRouter;
