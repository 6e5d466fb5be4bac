//! Write operations for query executor
//!
//! - insertOne, insertMany
//! - updateOne, updateMany
//! - deleteOne, deleteMany
//!
//! The read-only policy has already been checked by the time these run.

use mongodb::bson::{Bson, Document};
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::ParsedCall;
use crate::store::Namespace;

use super::super::result::{ExecutionResult, ResultData};
use super::{expect_max_args, invalid_args, required_document};

/// Write operations implementation
impl super::QueryExecutor {
    /// `insertOne(document)`
    pub(super) async fn execute_insert_one(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        expect_max_args(call, 1, "a single document")?;
        let document = required_document(call, 0, "a single document")?;

        debug!("Executing insertOne on '{}'", ns);

        let inserted_id = self.store.insert_one(ns, document).await?;
        Ok(ExecutionResult::write(
            ResultData::InsertOne { inserted_id },
            1,
        ))
    }

    /// `insertMany([documents])`
    pub(super) async fn execute_insert_many(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        const EXPECTED: &str = "a non-empty array of documents";

        expect_max_args(call, 1, EXPECTED)?;
        let documents: Vec<Document> = match call.arg(0) {
            Some(Bson::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_document().cloned())
                .collect::<Option<_>>()
                .ok_or_else(|| invalid_args(call, EXPECTED))?,
            _ => return Err(invalid_args(call, EXPECTED)),
        };

        debug!("Executing insertMany on '{}' with {} documents", ns, documents.len());

        let inserted_ids = self.store.insert_many(ns, documents).await?;
        let count = inserted_ids.len() as u64;

        info!("Inserted {} documents into '{}'", count, ns);
        Ok(ExecutionResult::write(
            ResultData::InsertMany { inserted_ids },
            count,
        ))
    }

    /// `updateOne(filter, update)` / `updateMany(filter, update)`
    pub(super) async fn execute_update(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
        many: bool,
    ) -> Result<ExecutionResult> {
        const EXPECTED: &str = "a filter document and an update document";

        expect_max_args(call, 2, EXPECTED)?;
        let filter = required_document(call, 0, EXPECTED)?;
        let update = required_document(call, 1, EXPECTED)?;

        debug!("Executing {} on '{}' with filter: {:?}", call.method, ns, filter);

        let outcome = if many {
            self.store.update_many(ns, filter, update).await?
        } else {
            self.store.update_one(ns, filter, update).await?
        };

        info!(
            "{}: matched {}, modified {}",
            call.method, outcome.matched, outcome.modified
        );
        Ok(ExecutionResult::write(
            ResultData::Update {
                matched: outcome.matched,
                modified: outcome.modified,
            },
            outcome.modified,
        ))
    }

    /// `deleteOne(filter)` / `deleteMany(filter)`
    ///
    /// The filter is mandatory; `{}` must be spelled out to delete everything.
    pub(super) async fn execute_delete(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
        many: bool,
    ) -> Result<ExecutionResult> {
        expect_max_args(call, 1, "a filter document")?;
        let filter = required_document(call, 0, "a filter document")?;

        debug!("Executing {} on '{}' with filter: {:?}", call.method, ns, filter);

        let deleted = if many {
            self.store.delete_many(ns, filter).await?
        } else {
            self.store.delete_one(ns, filter).await?
        };

        info!("{}: deleted {}", call.method, deleted);
        Ok(ExecutionResult::write(ResultData::Delete { deleted }, deleted))
    }
}
