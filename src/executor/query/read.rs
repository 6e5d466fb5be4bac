//! Read operations for query executor
//!
//! - cursor materialization (`find(...)...`)
//! - findOne
//! - countDocuments
//! - distinct

use mongodb::bson::Bson;
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::ParsedCall;
use crate::store::{FindCursor, Namespace};

use super::super::result::{ExecutionResult, ResultData};
use super::{expect_max_args, invalid_args, optional_document};

/// Read operations implementation
impl super::QueryExecutor {
    /// Materialize an open cursor
    pub(super) async fn materialize(
        &self,
        ns: &Namespace,
        cursor: FindCursor,
    ) -> Result<ExecutionResult> {
        info!(
            "Executing find on '{}' with filter: {:?}",
            ns, cursor.filter
        );

        if cursor.is_exhausted() {
            debug!("limit(0): skipping store round-trip");
            return Ok(ExecutionResult::read(ResultData::Documents(Vec::new())));
        }

        let documents = self.store.find(ns, &cursor).await?;

        info!("Retrieved {} documents", documents.len());
        Ok(ExecutionResult::read(ResultData::Documents(documents)))
    }

    /// `findOne(filter?, projection?)`
    pub(super) async fn execute_find_one(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        expect_max_args(call, 2, "an optional filter document and an optional projection")?;
        let filter = optional_document(call, 0, "a filter document")?.unwrap_or_default();
        let projection = optional_document(call, 1, "a projection document")?;

        debug!("Executing findOne on '{}' with filter: {:?}", ns, filter);

        let document = self.store.find_one(ns, filter, projection).await?;
        Ok(ExecutionResult::read(ResultData::Document(document)))
    }

    /// `countDocuments(filter?)`
    pub(super) async fn execute_count(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        expect_max_args(call, 1, "an optional filter document")?;
        let filter = optional_document(call, 0, "a filter document")?.unwrap_or_default();

        info!("Executing countDocuments on '{}'", ns);

        let count = self.store.count_documents(ns, filter).await?;

        info!("Count result: {}", count);
        Ok(ExecutionResult::read(ResultData::Count(count)))
    }

    /// `distinct(field, filter?)`
    pub(super) async fn execute_distinct(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        const EXPECTED: &str = "a field name string and an optional filter document";

        expect_max_args(call, 2, EXPECTED)?;
        let field = match call.arg(0) {
            Some(Bson::String(field)) if !field.is_empty() => field.clone(),
            _ => return Err(invalid_args(call, EXPECTED)),
        };
        let filter = optional_document(call, 1, EXPECTED)?.unwrap_or_default();

        debug!("Executing distinct on '{}' for field '{}'", ns, field);

        let values = self.store.distinct(ns, &field, filter).await?;

        info!("Distinct returned {} unique values", values.len());
        Ok(ExecutionResult::read(ResultData::Values(values)))
    }
}
