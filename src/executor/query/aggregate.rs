//! Aggregation for query executor

use mongodb::bson::{Bson, Document};
use tracing::info;

use crate::error::Result;
use crate::parser::ParsedCall;
use crate::store::Namespace;

use super::super::result::{ExecutionResult, ResultData};
use super::{expect_max_args, invalid_args};

const EXPECTED: &str = "an array of pipeline stage documents";

impl super::QueryExecutor {
    /// `aggregate([stages])`
    pub(super) async fn execute_aggregate(
        &self,
        ns: &Namespace,
        call: &ParsedCall,
    ) -> Result<ExecutionResult> {
        expect_max_args(call, 1, EXPECTED)?;
        let pipeline = pipeline_arg(call)?;

        info!("Executing aggregate on '{}' with {} stages", ns, pipeline.len());

        let documents = self.store.aggregate(ns, pipeline).await?;

        info!("Aggregation returned {} documents", documents.len());
        Ok(ExecutionResult::read(ResultData::Documents(documents)))
    }
}

/// The first argument as a list of stage documents.
fn pipeline_arg(call: &ParsedCall) -> Result<Vec<Document>> {
    let Some(Bson::Array(stages)) = call.arg(0) else {
        return Err(invalid_args(call, EXPECTED));
    };

    stages
        .iter()
        .map(|stage| match stage {
            Bson::Document(doc) if !doc.is_empty() => Ok(doc.clone()),
            _ => Err(invalid_args(call, EXPECTED)),
        })
        .collect()
}
