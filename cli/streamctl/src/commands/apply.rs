//! Apply a stream document.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use l4gate_streams::StreamCommands;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::{decode_stream, read_document, CommandContext};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Stream document (JSON), or `-` for stdin. A missing `id` creates a
    /// new stream.
    #[arg(value_name = "PATH")]
    file: PathBuf,
}

pub async fn run(ctx: CommandContext, args: ApplyArgs) -> Result<()> {
    let Some(stream) = decode_stream(read_document(&args.file)?)? else {
        anyhow::bail!("{} holds no stream (null document)", args.file.display());
    };

    let service = ctx.service().await?;
    service.save(&stream).await.map_err(CliError::from)?;

    match ctx.format {
        OutputFormat::Json => print_single(&stream, OutputFormat::Json),
        OutputFormat::Table => {
            print_success(&format!("Applied stream '{}'", stream.name));
            print_info(&format!("id: {}", stream.id));
        }
    }

    Ok(())
}
