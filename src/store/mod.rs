//! Document store collaborator
//!
//! The interpreter never talks to a driver directly. Everything it needs from
//! a database goes through [`DocumentStore`], shared as `Arc<dyn DocumentStore>`:
//! - [`MongoStore`]: backed by the official MongoDB driver
//! - [`MemoryStore`]: in-process collections, used by tests and `--in-memory`

use std::fmt;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde::Serialize;

use crate::error::Result;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A `database.collection` pair identifying one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Deferred read query.
///
/// Built up by `find(...)` and the cursor modifiers; nothing reaches the
/// store until [`DocumentStore::find`] materializes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindCursor {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindCursor {
    /// Open a cursor over every document matching `filter`.
    pub fn open(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(&mut self, spec: Document) {
        self.sort = Some(spec);
    }

    pub fn skip(&mut self, count: u64) {
        self.skip = Some(count);
    }

    /// Negative limits behave like their absolute value.
    pub fn limit(&mut self, count: i64) {
        self.limit = Some(count.unsigned_abs());
    }

    /// True when the cursor can never return a document.
    ///
    /// The driver reads a zero limit as "no limit", so callers must check
    /// this before materializing.
    pub fn is_exhausted(&self) -> bool {
        self.limit == Some(0)
    }
}

/// One entry of a database listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    #[serde(rename = "sizeOnDisk")]
    pub size_on_disk: u64,
    pub empty: bool,
}

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Connected, authorized access to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All databases, system databases included.
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>>;

    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    /// Materialize a cursor.
    async fn find(&self, ns: &Namespace, cursor: &FindCursor) -> Result<Vec<Document>>;

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>>;

    async fn aggregate(&self, ns: &Namespace, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Insert one document, returning its `_id`.
    async fn insert_one(&self, ns: &Namespace, document: Document) -> Result<Bson>;

    /// Insert documents in order, returning their `_id`s in the same order.
    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>>;

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome>;

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome>;

    /// Returns the number of deleted documents.
    async fn delete_one(&self, ns: &Namespace, filter: Document) -> Result<u64>;

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> Result<u64>;

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64>;

    async fn distinct(&self, ns: &Namespace, field: &str, filter: Document) -> Result<Vec<Bson>>;
}
