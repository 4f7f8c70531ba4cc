//! Show command implementation.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;

use super::open_feed;
use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct ItemOutput {
    id: String,
    author: Option<String>,
    created_at: Option<i64>,
    body: Option<String>,
    parent_title: Option<String>,
    parent_id: Option<String>,
    parent_url: Option<String>,
    ingested_at_bucket: String,
}

fn load(data_dir: &Path, feed: &str, id: &str) -> Result<ItemOutput> {
    let (feed, pool) = open_feed(data_dir, feed)?;
    let stored = pool
        .get_item(id)?
        .ok_or_else(|| anyhow!("no item {id} in {feed}"))?;

    Ok(ItemOutput {
        id: stored.item.id,
        author: stored.item.author,
        created_at: stored.item.created_at,
        body: stored.item.body,
        parent_title: stored.item.parent_title,
        parent_id: stored.item.parent_id,
        parent_url: stored.item.parent_url,
        ingested_at_bucket: stored.ingested_at_bucket,
    })
}

pub fn run(data_dir: &Path, feed: &str, id: &str, format: OutputFormat) -> Result<()> {
    let output = load(data_dir, feed, id)?;

    match format {
        OutputFormat::Text => {
            let absent = "-";
            println!("id:        {}", output.id);
            println!("author:    {}", output.author.as_deref().unwrap_or(absent));
            println!(
                "created:   {}",
                output.created_at.map_or_else(|| absent.to_string(), |t| t.to_string())
            );
            println!("thread:    {}", output.parent_title.as_deref().unwrap_or(absent));
            println!("thread id: {}", output.parent_id.as_deref().unwrap_or(absent));
            println!("url:       {}", output.parent_url.as_deref().unwrap_or(absent));
            println!("bucket:    {}", output.ingested_at_bucket);
            println!();
            println!("{}", output.body.as_deref().unwrap_or(absent));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
