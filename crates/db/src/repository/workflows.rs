//! Workflow CRUD operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowRow};

/// Insert a new workflow into the database.
///
/// `definition` must be a valid JSON object produced by serialising the
/// domain `WorkflowDocument` type from the `engine` crate.
pub async fn create_workflow(
    pool: &PgPool,
    id: Uuid,
    project_id: Uuid,
    name: &str,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        INSERT INTO workflows (id, project_id, name, definition, created_at, last_updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING id, project_id, name, definition, created_at, last_updated_at
        "#,
    )
    .bind(id)
    .bind(project_id)
    .bind(name)
    .bind(definition)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, project_id, name, definition, created_at, last_updated_at
        FROM workflows WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound("workflow"))?;

    Ok(row)
}

/// Return all workflows of a project, most recently edited first.
pub async fn list_workflows(pool: &PgPool, project_id: Uuid) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, project_id, name, definition, created_at, last_updated_at
        FROM workflows WHERE project_id = $1
        ORDER BY last_updated_at DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the workflow's name and definition and stamp `last_updated_at`.
///
/// Plain overwrite: resending the same definition is harmless.
/// Returns `DbError::NotFound` if no row matched both IDs.
pub async fn save_definition(
    pool: &PgPool,
    project_id: Uuid,
    id: Uuid,
    name: &str,
    definition: serde_json::Value,
) -> Result<DateTime<Utc>, DbError> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE workflows
        SET name = $1, definition = $2, last_updated_at = $3
        WHERE id = $4 AND project_id = $5
        "#,
    )
    .bind(name)
    .bind(definition)
    .bind(now)
    .bind(id)
    .bind(project_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("workflow"));
    }

    Ok(now)
}
