//! Execution result types
//!
//! - ExecutionResult: overall result of a command execution
//! - ResultData: the shapes a command can return
//! - ExecutionStats: timing and document counts

use mongodb::bson::{Bson, Document};
use serde::{Serialize, Serializer};
use serde_json::{Value as JsonValue, json};

use crate::formatter::bson_utils::{BsonConverter, JsonConverter, id_to_text};
use crate::store::DatabaseInfo;

/// Result of command execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Result data (documents, counts, acknowledgements, ...)
    pub data: ResultData,

    /// Execution statistics
    pub stats: ExecutionStats,
}

/// Data returned from command execution
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    /// Materialized cursor or aggregation output
    Documents(Vec<Document>),

    /// `findOne` hit, or `None` when nothing matched
    Document(Option<Document>),

    /// Count result
    Count(u64),

    /// Distinct values
    Values(Vec<Bson>),

    /// Database listing
    Databases(Vec<DatabaseInfo>),

    /// Collection names
    Collections(Vec<String>),

    /// Insert one result
    InsertOne { inserted_id: Bson },

    /// Insert many result
    InsertMany { inserted_ids: Vec<Bson> },

    /// Update result
    Update { matched: u64, modified: u64 },

    /// Delete result
    Delete { deleted: u64 },

    /// Acknowledgement of `use <database>`
    Switched { database: String, message: String },
}

/// Execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    /// Execution time in milliseconds
    pub execution_time_ms: u64,

    /// Number of documents returned
    pub documents_returned: usize,

    /// Number of documents affected by a write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_affected: Option<u64>,
}

impl ExecutionResult {
    /// Create a result with the given stats
    pub fn new(data: ResultData, stats: ExecutionStats) -> Self {
        Self { data, stats }
    }

    /// Create a read result; `documents_returned` is derived from the data
    pub fn read(data: ResultData) -> Self {
        let documents_returned = data.document_count();
        Self::new(
            data,
            ExecutionStats {
                documents_returned,
                ..ExecutionStats::default()
            },
        )
    }

    /// Create a write result affecting `affected` documents
    pub fn write(data: ResultData, affected: u64) -> Self {
        Self::new(
            data,
            ExecutionStats {
                documents_affected: Some(affected),
                ..ExecutionStats::default()
            },
        )
    }

    /// Serialized result data
    pub fn to_json(&self) -> JsonValue {
        self.data.to_json()
    }
}

impl ResultData {
    /// Number of documents (or values) carried by read results
    pub fn document_count(&self) -> usize {
        match self {
            ResultData::Documents(docs) => docs.len(),
            ResultData::Document(doc) => usize::from(doc.is_some()),
            ResultData::Values(values) => values.len(),
            _ => 0,
        }
    }

    /// Convert into the JSON shape callers receive.
    ///
    /// Identifiers anywhere in documents become their hex text; inserted ids
    /// are always text.
    pub fn to_json(&self) -> JsonValue {
        let converter = JsonConverter::new();

        match self {
            ResultData::Documents(docs) => json!({
                "documents": converter.convert_documents(docs),
                "count": docs.len(),
            }),
            ResultData::Document(Some(doc)) => converter.convert_document(doc),
            ResultData::Document(None) => JsonValue::Null,
            ResultData::Count(count) => json!(count),
            ResultData::Values(values) => {
                JsonValue::Array(values.iter().map(|v| converter.convert(v)).collect())
            }
            ResultData::Databases(databases) => json!(databases),
            ResultData::Collections(names) => json!(names),
            ResultData::InsertOne { inserted_id } => json!({
                "acknowledged": true,
                "insertedId": id_to_text(inserted_id),
            }),
            ResultData::InsertMany { inserted_ids } => json!({
                "acknowledged": true,
                "insertedIds": inserted_ids.iter().map(id_to_text).collect::<Vec<_>>(),
                "insertedCount": inserted_ids.len(),
            }),
            ResultData::Update { matched, modified } => json!({
                "acknowledged": true,
                "matchedCount": matched,
                "modifiedCount": modified,
            }),
            ResultData::Delete { deleted } => json!({
                "acknowledged": true,
                "deletedCount": deleted,
            }),
            ResultData::Switched { database, message } => json!({
                "database": database,
                "message": message,
            }),
        }
    }
}

impl Serialize for ResultData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
