//! `queue` crate: debounced, coalescing, single-flight persistence of
//! editor snapshots, and the `EditorSession` that wires it to the reducer.

pub mod config;
pub mod error;
pub mod queue;
pub mod session;

pub use config::QueueConfig;
pub use error::QueueError;
pub use queue::{PersistenceQueue, SaveEvent};
pub use session::EditorSession;
