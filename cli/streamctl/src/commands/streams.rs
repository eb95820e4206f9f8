//! Stored stream queries and deletion.

use anyhow::Result;
use clap::Args;
use l4gate_streams::StreamCommands;

use crate::error::CliError;
use crate::output::{
    print_info, print_output, print_single, print_success, OutputFormat, StreamRow,
};

use super::{parse_id, CommandContext};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Streams per page (1-500).
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub page_size: u32,

    /// Zero-based page number.
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    /// Case-insensitive name filter.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Stream ID (strm_<ULID>).
    id: String,
}

pub async fn list(ctx: CommandContext, args: ListArgs) -> Result<()> {
    let service = ctx.service().await?;
    let page = service
        .list(args.page_size, args.page, args.search.as_deref())
        .await
        .map_err(CliError::from)?;

    match ctx.format {
        OutputFormat::Json => print_single(&page, ctx.format),
        OutputFormat::Table => {
            let rows: Vec<StreamRow> = page.contents.iter().map(StreamRow::from).collect();
            print_output(&rows, ctx.format);
            let pages = page.total_items.div_ceil(u64::from(page.page_size));
            print_info(&format!(
                "page {} of {} ({} stream(s))",
                page.page_number + 1,
                pages.max(1),
                page.total_items
            ));
        }
    }

    Ok(())
}

pub async fn get(ctx: CommandContext, args: IdArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let service = ctx.service().await?;

    let stream = service
        .get(&id)
        .await
        .map_err(CliError::from)?
        .ok_or_else(|| CliError::NotFound(id.to_string()))?;

    print_single(&stream, ctx.format);
    Ok(())
}

pub async fn delete(ctx: CommandContext, args: IdArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let service = ctx.service().await?;

    service.delete(&id).await.map_err(CliError::from)?;

    match ctx.format {
        OutputFormat::Json => {
            print_single(&serde_json::json!({ "id": id, "deleted": true }), ctx.format)
        }
        OutputFormat::Table => print_success(&format!("Deleted stream {id}")),
    }
    Ok(())
}

pub async fn exists(ctx: CommandContext, args: IdArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let service = ctx.service().await?;

    let exists = service.exists(&id).await.map_err(CliError::from)?;

    match ctx.format {
        OutputFormat::Json => {
            print_single(&serde_json::json!({ "id": id, "exists": exists }), ctx.format)
        }
        OutputFormat::Table => println!("{exists}"),
    }
    Ok(())
}

pub async fn enabled(ctx: CommandContext) -> Result<()> {
    let service = ctx.service().await?;

    let mut streams = service.get_all_enabled().await.map_err(CliError::from)?;
    streams.sort_by(|a, b| a.name.cmp(&b.name));

    let rows: Vec<StreamRow> = streams.iter().map(StreamRow::from).collect();
    print_output(&rows, ctx.format);
    Ok(())
}
