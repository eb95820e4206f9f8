//! CLI commands.

mod apply;
mod streams;
mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use l4gate_streams::{db::Database, Stream, StreamId, StreamService};
use tracing::debug;

use crate::config::Config;
use crate::error::CliError;
use crate::output::OutputFormat;

/// streamctl - validate and manage l4gate streams.
#[derive(Debug, Parser)]
#[command(name = "streamctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Postgres connection URL.
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a stream document without touching the database.
    Validate(validate::ValidateArgs),

    /// Validate a stream document and store it.
    Apply(apply::ApplyArgs),

    /// List streams, ordered by name.
    List(streams::ListArgs),

    /// Show a single stream.
    Get(streams::IdArgs),

    /// Delete a stream.
    Delete(streams::IdArgs),

    /// Report whether a stream exists.
    Exists(streams::IdArgs),

    /// List every enabled stream.
    Enabled,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self, mut config: Config) -> Result<()> {
        if let Some(url) = self.database_url {
            config.database = config.database.with_database_url(url);
        }

        let ctx = CommandContext {
            config,
            format: self.format,
        };

        match self.command {
            Commands::Validate(args) => validate::run(ctx, args),
            Commands::Apply(args) => apply::run(ctx, args).await,
            Commands::List(args) => streams::list(ctx, args).await,
            Commands::Get(args) => streams::get(ctx, args).await,
            Commands::Delete(args) => streams::delete(ctx, args).await,
            Commands::Exists(args) => streams::exists(ctx, args).await,
            Commands::Enabled => streams::enabled(ctx).await,
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Connect to Postgres and build the stream commands over it.
    pub async fn service(&self) -> Result<StreamService> {
        let db = Database::connect(&self.config.database)
            .await
            .map_err(CliError::from)?;

        if self.config.run_migrations {
            db.run_migrations().await.map_err(CliError::from)?;
        }

        Ok(StreamService::new(Arc::new(db.stream_repository())))
    }
}

/// Read a JSON document from `path`, or from stdin when `path` is `-`.
fn read_document(path: &Path) -> Result<serde_json::Value> {
    let contents = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("failed to read stream from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stream document {}", path.display()))?
    };

    serde_json::from_str(&contents).context("stream document is not valid JSON")
}

/// Decode a stream document. `null` decodes to `None`; a missing `id` is
/// filled with a fresh one.
fn decode_stream(mut document: serde_json::Value) -> Result<Option<Stream>> {
    if document.is_null() {
        return Ok(None);
    }

    if let Some(object) = document.as_object_mut() {
        if !object.contains_key("id") {
            let id = StreamId::new();
            debug!(stream_id = %id, "Assigned id to stream document");
            object.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        }
    }

    let stream = serde_json::from_value(document).context("invalid stream document")?;
    Ok(Some(stream))
}

/// Parse a stream ID argument.
fn parse_id(raw: &str) -> Result<StreamId> {
    raw.parse()
        .with_context(|| format!("'{raw}' is not a stream ID (expected strm_<ULID>)"))
}
