//! Admin executor for database-level commands
//!
//! - `show dbs` / `show databases`
//! - `db.getCollectionNames()`, `db.<database>.getCollectionNames()`
//! - `use <database>`

use std::sync::Arc;

use tracing::info;

use crate::error::{Result, UsageError};
use crate::store::DocumentStore;

use super::result::{ExecutionResult, ResultData};

/// Databases hidden from listings
pub const SYSTEM_DATABASES: &[&str] = &["admin", "local", "config"];

/// Executor for administrative commands
pub struct AdminExecutor {
    store: Arc<dyn DocumentStore>,
}

impl AdminExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// List non-system databases
    pub async fn show_databases(&self) -> Result<ExecutionResult> {
        info!("Listing databases");

        let databases: Vec<_> = self
            .store
            .list_databases()
            .await?
            .into_iter()
            .filter(|db| !SYSTEM_DATABASES.contains(&db.name.as_str()))
            .collect();

        info!("Found {} databases", databases.len());
        Ok(ExecutionResult::read(ResultData::Databases(databases)))
    }

    /// List collections of `database`
    pub async fn list_collections(&self, database: &str) -> Result<ExecutionResult> {
        info!("Listing collections in database '{}'", database);

        let names = self.store.list_collections(database).await?;

        info!("Found {} collections", names.len());
        Ok(ExecutionResult::read(ResultData::Collections(names)))
    }

    /// Check that `name` exists.
    ///
    /// Nothing is remembered here; the caller decides whether to switch.
    pub async fn use_database(&self, name: &str) -> Result<ExecutionResult> {
        let exists = self
            .store
            .list_databases()
            .await?
            .iter()
            .any(|db| db.name == name);

        if !exists {
            return Err(UsageError::UnknownDatabase(name.to_string()).into());
        }

        info!("Database '{}' selected", name);
        Ok(ExecutionResult::read(ResultData::Switched {
            database: name.to_string(),
            message: format!("switched to db {name}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use crate::store::{MemoryStore, Namespace};
    use mongodb::bson::doc;

    fn executor() -> AdminExecutor {
        let store = MemoryStore::new()
            .with_documents(&Namespace::new("admin", "system.users"), vec![doc! { "u": 1 }])
            .with_documents(&Namespace::new("local", "startup_log"), vec![doc! { "s": 1 }])
            .with_documents(&Namespace::new("shop", "orders"), vec![doc! { "total": 5 }])
            .with_documents(&Namespace::new("shop", "products"), vec![doc! { "price": 9 }]);
        AdminExecutor::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_show_databases_hides_system() {
        let result = executor().show_databases().await.unwrap();
        let ResultData::Databases(databases) = result.data else {
            panic!("expected databases");
        };
        let names: Vec<&str> = databases.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["shop"]);
    }

    #[tokio::test]
    async fn test_list_collections() {
        let result = executor().list_collections("shop").await.unwrap();
        assert_eq!(
            result.data,
            ResultData::Collections(vec!["orders".to_string(), "products".to_string()])
        );
    }

    #[tokio::test]
    async fn test_use_database() {
        let result = executor().use_database("shop").await.unwrap();
        assert_eq!(
            result.to_json(),
            serde_json::json!({ "database": "shop", "message": "switched to db shop" })
        );

        let err = executor().use_database("missing").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Usage(UsageError::UnknownDatabase(_))));
    }
}
