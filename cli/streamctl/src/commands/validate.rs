//! Offline validation of stream documents.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use l4gate_streams::validate_stream;

use crate::output::{print_output, print_single, print_success, OutputFormat, ViolationRow};

use super::{decode_stream, read_document, CommandContext};

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Stream document (JSON), or `-` for stdin.
    #[arg(value_name = "PATH")]
    file: PathBuf,
}

pub fn run(ctx: CommandContext, args: ValidateArgs) -> Result<()> {
    let stream = decode_stream(read_document(&args.file)?)?;

    let violations = match validate_stream(stream.as_ref()) {
        Ok(()) => Vec::new(),
        Err(err) => err.into_violations(),
    };

    match ctx.format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "valid": violations.is_empty(),
                "violations": violations,
            });
            print_single(&out, OutputFormat::Json);
        }
        OutputFormat::Table if violations.is_empty() => {
            print_success(&format!("Stream is valid: {}", args.file.display()));
        }
        OutputFormat::Table => {
            let rows: Vec<ViolationRow> = violations.iter().map(ViolationRow::from).collect();
            print_output(&rows, OutputFormat::Table);
        }
    }

    if !violations.is_empty() {
        anyhow::bail!("Stream validation failed ({} violation(s))", violations.len());
    }

    Ok(())
}
