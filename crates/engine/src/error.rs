//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::models::EntityKind;

/// A delta op that does not fit the snapshot it is applied to.
///
/// Only reachable when a log is replayed against a snapshot it was not
/// recorded from; the reducer absorbs it as a no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("{kind} index {index} out of range (len {len})")]
    OutOfRange {
        kind: EntityKind,
        index: usize,
        len: usize,
    },
}

/// Errors produced at the Load / Save / Publish boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No workflow with this ID exists in the store.
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(Uuid),

    /// The stored definition could not be decoded, or the document encoded.
    #[error("workflow document codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The backing store refused the write.
    #[error("store rejected the write: {0}")]
    Rejected(String),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
