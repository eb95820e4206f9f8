//! Error handling and display for the CLI.

use colored::Colorize;
use l4gate_streams::{db::DbError, CommandError, StorageError, ValidationError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Stream not found: {0}")]
    NotFound(String),

    #[error("Stream rejected: {0}")]
    InvalidStream(ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Validation(violations) => CliError::InvalidStream(violations),
            CommandError::Storage(err) => CliError::Storage(err),
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Check for specific error types and provide hints
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::InvalidStream(violations) => {
                eprintln!();
                for violation in violations.violations() {
                    eprintln!("  {} {}", "-".red(), violation);
                }
            }
            CliError::NotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run `streamctl list` to see stored streams.".yellow()
                );
            }
            CliError::Database(DbError::Connect(_)) | CliError::Storage(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check DATABASE_URL (or --database-url) and that Postgres is reachable."
                        .yellow()
                );
            }
            CliError::Database(DbError::MigrationDirNotFound { .. }) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run from the repository root, or unset STREAMCTL_RUN_MIGRATIONS."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}
