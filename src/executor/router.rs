//! Command router
//!
//! Parses one input line and dispatches it:
//! - database commands → AdminExecutor
//! - collection chains → QueryExecutor

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::error::Result;
use crate::parser::{Command, CommandParser};
use crate::store::DocumentStore;

use super::admin::AdminExecutor;
use super::policy::ReadOnlyPolicy;
use super::query::QueryExecutor;
use super::result::ExecutionResult;

/// Entry point of the interpreter.
///
/// Holds no per-request state; concurrent callers may share one router.
pub struct CommandRouter {
    admin: AdminExecutor,
    query: QueryExecutor,
}

impl CommandRouter {
    pub fn new(store: Arc<dyn DocumentStore>, policy: Arc<dyn ReadOnlyPolicy>) -> Self {
        Self {
            admin: AdminExecutor::new(Arc::clone(&store)),
            query: QueryExecutor::new(store, policy),
        }
    }

    /// Parse and execute one line of input.
    ///
    /// `current_database` enables the `db.<collection>...` shorthand and
    /// `db.getCollectionNames()`; it is never stored.
    pub async fn execute(
        &self,
        input: &str,
        current_database: Option<&str>,
    ) -> Result<ExecutionResult> {
        let command = CommandParser::parse(input, current_database)?;
        self.route(command).await
    }

    /// Dispatch an already parsed command
    pub async fn route(&self, command: Command) -> Result<ExecutionResult> {
        debug!("Routing command: {:?}", command);

        let start = Instant::now();

        let result = match &command {
            Command::ShowDatabases => self.admin.show_databases().await,
            Command::ListCollections { database } => self.admin.list_collections(database).await,
            Command::UseDatabase(name) => self.admin.use_database(name).await,
            Command::Chain { namespace, chain } => self.query.execute(namespace, chain).await,
        };

        let elapsed = start.elapsed().as_millis() as u64;
        debug!("Command executed in {}ms", elapsed);

        result.map(|mut exec_result| {
            exec_result.stats.execution_time_ms = elapsed;
            exec_result
        })
    }
}
