//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// projects
// ---------------------------------------------------------------------------

/// A project row. `published_workflow_id` is the live workflow, if any.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub published_workflow_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    /// Full JSON workflow document (agents, tools, prompts, startAgent, …)
    pub definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}
