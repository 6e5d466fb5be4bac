//! Chain executor for collection operations
//!
//! A chain is evaluated left to right with a single "active cursor" register:
//! - `find` opens the cursor; `sort`, `skip`, `limit`, `toArray` and `pretty`
//!   modify it; the cursor is materialized once the chain is exhausted.
//! - Any other method in first position is a terminal operation. It runs
//!   immediately and must be the only call in the chain.
//!
//! Terminal operations are organized by kind:
//! - `read`: findOne, countDocuments, distinct, cursor materialization
//! - `write`: insertOne, insertMany, updateOne, updateMany, deleteOne, deleteMany
//! - `aggregate`: aggregate

use std::sync::Arc;

use mongodb::bson::{Bson, Document};
use tracing::debug;

use crate::error::{ParseError, Result, UsageError};
use crate::parser::{CallChain, ParsedCall};
use crate::store::{DocumentStore, FindCursor, Namespace};

use super::policy::{ReadOnlyPolicy, enforce};
use super::result::ExecutionResult;

mod aggregate;
mod read;
mod write;

#[cfg(test)]
mod tests;

/// Operations accepted at the start of a chain
pub const SUPPORTED_OPERATIONS: &[&str] = &[
    "find",
    "findOne",
    "aggregate",
    "insertOne",
    "insertMany",
    "updateOne",
    "updateMany",
    "deleteOne",
    "deleteMany",
    "countDocuments",
    "distinct",
];

/// Calls accepted after `find(...)`
pub const CURSOR_METHODS: &[&str] = &["sort", "skip", "limit", "toArray", "pretty"];

/// Executes call chains against one store
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    policy: Arc<dyn ReadOnlyPolicy>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, policy: Arc<dyn ReadOnlyPolicy>) -> Self {
        Self { store, policy }
    }

    /// Execute a chain against the collection `ns`.
    ///
    /// Every failure aborts the rest of the chain. Nothing already executed
    /// is rolled back.
    pub async fn execute(&self, ns: &Namespace, chain: &CallChain) -> Result<ExecutionResult> {
        debug!("Executing {:?} on {}", chain.methods(), ns);

        let mut cursor: Option<FindCursor> = None;

        for (index, call) in chain.calls().iter().enumerate() {
            match call.method.as_str() {
                "find" => {
                    if cursor.is_some() {
                        return Err(UsageError::CursorAlreadyOpen.into());
                    }
                    cursor = Some(open_cursor(call)?);
                }
                "sort" => {
                    expect_max_args(call, 1, "a sort document")?;
                    let spec = required_document(call, 0, "a sort document")?;
                    active(&mut cursor, call)?.sort(spec);
                }
                "skip" => {
                    expect_max_args(call, 1, "a non-negative integer")?;
                    let count = integer_arg(call, "a non-negative integer")?;
                    let count = u64::try_from(count)
                        .map_err(|_| invalid_args(call, "a non-negative integer"))?;
                    active(&mut cursor, call)?.skip(count);
                }
                "limit" => {
                    expect_max_args(call, 1, "an integer")?;
                    let count = integer_arg(call, "an integer")?;
                    active(&mut cursor, call)?.limit(count);
                }
                "toArray" | "pretty" => {
                    expect_max_args(call, 0, "no arguments")?;
                    active(&mut cursor, call)?;
                }
                method if cursor.is_some() => {
                    return Err(UsageError::UnsupportedMethod {
                        method: method.to_string(),
                        supported: CURSOR_METHODS,
                    }
                    .into());
                }
                method => {
                    if let Some(next) = chain.calls().get(index + 1) {
                        return Err(UsageError::TerminalNotLast {
                            method: method.to_string(),
                            next: next.method.clone(),
                        }
                        .into());
                    }
                    return self.execute_terminal(ns, call).await;
                }
            }
        }

        match cursor {
            Some(cursor) => self.materialize(ns, cursor).await,
            None => Err(ParseError::SyntaxError("empty call chain".to_string()).into()),
        }
    }

    /// Dispatch a single non-cursor operation
    async fn execute_terminal(&self, ns: &Namespace, call: &ParsedCall) -> Result<ExecutionResult> {
        let method = call.method.as_str();
        enforce(self.policy.as_ref(), method)?;

        match method {
            "findOne" => self.execute_find_one(ns, call).await,
            "countDocuments" => self.execute_count(ns, call).await,
            "distinct" => self.execute_distinct(ns, call).await,
            "aggregate" => self.execute_aggregate(ns, call).await,
            "insertOne" => self.execute_insert_one(ns, call).await,
            "insertMany" => self.execute_insert_many(ns, call).await,
            "updateOne" => self.execute_update(ns, call, false).await,
            "updateMany" => self.execute_update(ns, call, true).await,
            "deleteOne" => self.execute_delete(ns, call, false).await,
            "deleteMany" => self.execute_delete(ns, call, true).await,
            other => Err(UsageError::UnsupportedMethod {
                method: other.to_string(),
                supported: SUPPORTED_OPERATIONS,
            }
            .into()),
        }
    }
}

/// `find(filter?, projection?)`
fn open_cursor(call: &ParsedCall) -> Result<FindCursor> {
    expect_max_args(call, 2, "an optional filter document and an optional projection")?;
    let filter = optional_document(call, 0, "a filter document")?.unwrap_or_default();
    let projection = optional_document(call, 1, "a projection document")?;
    Ok(FindCursor::open(filter).with_projection(projection))
}

fn active<'a>(cursor: &'a mut Option<FindCursor>, call: &ParsedCall) -> Result<&'a mut FindCursor> {
    cursor
        .as_mut()
        .ok_or_else(|| UsageError::CursorRequired(call.method.clone()).into())
}

/* ============================ argument helpers ============================ */

fn invalid_args(call: &ParsedCall, expected: &str) -> crate::error::ConsoleError {
    UsageError::InvalidArguments {
        method: call.method.clone(),
        expected: expected.to_string(),
    }
    .into()
}

fn expect_max_args(call: &ParsedCall, max: usize, expected: &str) -> Result<()> {
    if call.args.len() > max {
        return Err(invalid_args(call, expected));
    }
    Ok(())
}

/// Document argument at `index`; missing or `null` yields `None`.
fn optional_document(
    call: &ParsedCall,
    index: usize,
    expected: &str,
) -> Result<Option<Document>> {
    match call.arg(index) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(doc)) => Ok(Some(doc.clone())),
        Some(_) => Err(invalid_args(call, expected)),
    }
}

fn required_document(call: &ParsedCall, index: usize, expected: &str) -> Result<Document> {
    optional_document(call, index, expected)?.ok_or_else(|| invalid_args(call, expected))
}

/// Integer argument for `limit`/`skip`; numeric strings are coerced.
fn integer_arg(call: &ParsedCall, expected: &str) -> Result<i64> {
    let value = match call.arg(0) {
        Some(Bson::Int32(n)) => Some(i64::from(*n)),
        Some(Bson::Int64(n)) => Some(*n),
        Some(Bson::Double(n)) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
        Some(Bson::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| invalid_args(call, expected))
}
