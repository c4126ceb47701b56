//! Project rows and the published-workflow pointer.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::ProjectRow};

/// Insert a new project with no published workflow.
pub async fn create_project(pool: &PgPool, name: &str) -> Result<ProjectRow, DbError> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects (id, name, published_workflow_id, created_at)
        VALUES ($1, $2, NULL, $3)
        RETURNING id, name, published_workflow_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Return the project's published workflow ID (`None` when nothing is live).
///
/// Returns `DbError::NotFound` if the project does not exist.
pub async fn get_published_workflow_id(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Option<Uuid>, DbError> {
    let published = sqlx::query_scalar::<_, Option<Uuid>>(
        r#"SELECT published_workflow_id FROM projects WHERE id = $1"#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound("project"))?;

    Ok(published)
}

/// Point the project at `workflow_id` as its live workflow.
pub async fn set_published_workflow_id(
    pool: &PgPool,
    project_id: Uuid,
    workflow_id: Uuid,
) -> Result<(), DbError> {
    let result = sqlx::query(r#"UPDATE projects SET published_workflow_id = $1 WHERE id = $2"#)
        .bind(workflow_id)
        .bind(project_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("project"));
    }

    Ok(())
}
