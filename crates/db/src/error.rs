//! Errors raised by the workflow editor's persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A lookup or guarded update matched no row; names the table.
    #[error("no matching {0} row")]
    NotFound(&'static str),

    #[error("could not apply editor schema migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
