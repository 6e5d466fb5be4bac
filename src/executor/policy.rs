//! Read-only policy
//!
//! Mutating operations consult the policy immediately before they would be
//! dispatched. A rejected operation never reaches the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::{PolicyError, Result};

/// Methods that write to the store.
pub const MUTATING_METHODS: &[&str] = &[
    "insertOne",
    "insertMany",
    "updateOne",
    "updateMany",
    "deleteOne",
    "deleteMany",
];

/// Answers "is the console read-only right now?"
pub trait ReadOnlyPolicy: Send + Sync {
    fn is_read_only(&self) -> bool;
}

/// Shared toggle; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyFlag(Arc<AtomicBool>);

impl ReadOnlyFlag {
    pub fn new(read_only: bool) -> Self {
        Self(Arc::new(AtomicBool::new(read_only)))
    }

    pub fn set(&self, read_only: bool) {
        self.0.store(read_only, Ordering::SeqCst);
    }
}

impl ReadOnlyPolicy for ReadOnlyFlag {
    fn is_read_only(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn is_mutating(method: &str) -> bool {
    MUTATING_METHODS.contains(&method)
}

/// Reject `method` if it writes and the policy is active.
pub fn enforce(policy: &dyn ReadOnlyPolicy, method: &str) -> Result<()> {
    if is_mutating(method) && policy.is_read_only() {
        warn!("Blocked `{}` in read-only mode", method);
        return Err(PolicyError::ReadOnly {
            operation: method.to_string(),
        }
        .into());
    }
    Ok(())
}
