//! Queue-level error types.

use engine::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// A write (or load / publish) was refused by the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The writer task has stopped; nothing more can be queued.
    #[error("persistence queue is closed")]
    Closed,
}
