//! Pool setup and schema migrations for the editor's Postgres store.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Shared by the API's sessions and the CLI commands.
pub type DbPool = PgPool;

/// How long a save may wait for a free connection before it fails.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect to the editor database.
///
/// Every open editor session holds at most one connection at a time (its
/// single writer), so `max_connections` bounds concurrent saves.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(max_connections, "Connecting to workflow store");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create or upgrade the `projects` and `workflows` tables.
///
/// The scripts under the workspace's `migrations/` directory
/// (`0001_workflow_editor.sql` onwards) are embedded at build time.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(scripts = migrator.iter().count(), "Applying editor schema migrations");
    migrator.run(pool).await?;
    Ok(())
}
