//! Database error types.

use thiserror::Error;

use crate::repository::StorageError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error(
        "migration directory not found; tried {tried}. Last error: {last_error}. \
         Run from repo root or libs/streams."
    )]
    MigrationDirNotFound { tried: String, last_error: String },

    /// A stored row could not be turned back into a stream.
    #[error("corrupt stream row {stream_id}: {reason}")]
    Decode { stream_id: String, reason: String },
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        StorageError::new(err)
    }
}
