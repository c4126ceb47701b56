//! `engine` crate: workflow document model, undoable reducer, and the
//! Load / Save / Publish store boundary.

pub mod models;
pub mod error;
pub mod delta;
pub mod history;
pub mod mentions;
pub mod naming;
pub mod selection;
pub mod state;
pub mod reducer;
pub mod validate;
pub mod store;
pub mod mock;

pub use models::{Agent, AgentType, Entity, EntityKind, Prompt, Tool, WorkflowDocument};
pub use error::{DeltaError, StoreError};
pub use reducer::{reduce, Action, EditCommand};
pub use state::{EditorState, EditorView, ToolEntry, ToolOrigin};
pub use validate::{validate_document, ValidationIssue};
pub use store::{LoadedWorkflow, MemoryStore, PgWorkflowStore, WorkflowStore};
