//! The Load / Save / Publish boundary between the editor and persistence.
//!
//! The reducer never touches a store; the persistence queue and the HTTP
//! layer do, through the `WorkflowStore` trait, so tests can swap in
//! `MemoryStore` or `MockStore`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{repository, DbError, DbPool};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::WorkflowDocument;

/// What a session needs to open a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWorkflow {
    pub document: WorkflowDocument,
    /// The project's live workflow, if one is published.
    pub published_workflow_id: Option<Uuid>,
}

/// Durable home of workflow documents.
///
/// `save` is a plain overwrite and must be safe to repeat with the same
/// document.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, workflow_id: Uuid) -> Result<LoadedWorkflow, StoreError>;

    /// Persist `document` and return the time the store stamped it with.
    async fn save(
        &self,
        project_id: Uuid,
        workflow_id: Uuid,
        document: &WorkflowDocument,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Make `workflow_id` the project's live workflow.
    async fn publish(&self, project_id: Uuid, workflow_id: Uuid) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// `WorkflowStore` backed by the `workflows` / `projects` tables.
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: DbPool,
}

impl PgWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert `document` as a new workflow row, keeping its ID.
    pub async fn import(&self, document: &WorkflowDocument) -> Result<(), StoreError> {
        let definition = serde_json::to_value(document)?;
        repository::workflows::create_workflow(
            &self.pool,
            document.id,
            document.project_id,
            &document.name,
            definition,
        )
        .await?;
        info!(workflow_id = %document.id, "Imported workflow");
        Ok(())
    }

    /// Every workflow of a project, most recently edited first.
    pub async fn list(&self, project_id: Uuid) -> Result<Vec<WorkflowDocument>, StoreError> {
        let rows = repository::workflows::list_workflows(&self.pool, project_id).await?;
        rows.into_iter().map(decode_row).collect()
    }
}

/// The row columns win over whatever the JSON definition carries; `save`
/// writes the name to both, so a rename survives the round-trip.
fn decode_row(row: db::models::WorkflowRow) -> Result<WorkflowDocument, StoreError> {
    let mut document: WorkflowDocument = serde_json::from_value(row.definition)?;
    document.id = row.id;
    document.project_id = row.project_id;
    document.name = row.name;
    document.last_updated_at = row.last_updated_at;
    Ok(document)
}

fn not_found_as(workflow_id: Uuid) -> impl FnOnce(DbError) -> StoreError {
    move |err| match err {
        DbError::NotFound(_) => StoreError::WorkflowNotFound(workflow_id),
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn load(&self, workflow_id: Uuid) -> Result<LoadedWorkflow, StoreError> {
        let row = repository::workflows::get_workflow(&self.pool, workflow_id)
            .await
            .map_err(not_found_as(workflow_id))?;
        let published_workflow_id =
            repository::projects::get_published_workflow_id(&self.pool, row.project_id).await?;

        Ok(LoadedWorkflow { document: decode_row(row)?, published_workflow_id })
    }

    async fn save(
        &self,
        project_id: Uuid,
        workflow_id: Uuid,
        document: &WorkflowDocument,
    ) -> Result<DateTime<Utc>, StoreError> {
        let definition = serde_json::to_value(document)?;
        repository::workflows::save_definition(
            &self.pool,
            project_id,
            workflow_id,
            &document.name,
            definition,
        )
        .await
        .map_err(not_found_as(workflow_id))
    }

    async fn publish(&self, project_id: Uuid, workflow_id: Uuid) -> Result<(), StoreError> {
        repository::projects::set_published_workflow_id(&self.pool, project_id, workflow_id).await?;
        info!(%project_id, %workflow_id, "Published workflow");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store for tests and the CLI's offline commands.
#[derive(Debug, Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<Uuid, WorkflowDocument>>,
    published: RwLock<HashMap<Uuid, Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document: WorkflowDocument) {
        self.workflows.write().await.insert(document.id, document);
    }

    /// Last saved copy of a workflow.
    pub async fn get(&self, workflow_id: Uuid) -> Option<WorkflowDocument> {
        self.workflows.read().await.get(&workflow_id).cloned()
    }

    pub async fn published(&self, project_id: Uuid) -> Option<Uuid> {
        self.published.read().await.get(&project_id).copied()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn load(&self, workflow_id: Uuid) -> Result<LoadedWorkflow, StoreError> {
        let document = self
            .get(workflow_id)
            .await
            .ok_or(StoreError::WorkflowNotFound(workflow_id))?;
        let published_workflow_id = self.published(document.project_id).await;
        Ok(LoadedWorkflow { document, published_workflow_id })
    }

    async fn save(
        &self,
        project_id: Uuid,
        workflow_id: Uuid,
        document: &WorkflowDocument,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut workflows = self.workflows.write().await;
        let slot = workflows
            .get_mut(&workflow_id)
            .filter(|existing| existing.project_id == project_id)
            .ok_or(StoreError::WorkflowNotFound(workflow_id))?;

        let now = Utc::now();
        *slot = document.clone();
        slot.last_updated_at = now;
        Ok(now)
    }

    async fn publish(&self, project_id: Uuid, workflow_id: Uuid) -> Result<(), StoreError> {
        self.published.write().await.insert(project_id, workflow_id);
        Ok(())
    }
}
