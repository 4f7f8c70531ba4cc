//! Count command implementation.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::open_feed;
use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct CountOutput {
    feed: String,
    count: u64,
}

fn load(data_dir: &Path, feed: &str) -> Result<CountOutput> {
    let (feed, pool) = open_feed(data_dir, feed)?;
    Ok(CountOutput {
        feed: feed.to_string(),
        count: pool.count()?,
    })
}

pub fn run(data_dir: &Path, feed: &str, format: OutputFormat) -> Result<()> {
    let output = load(data_dir, feed)?;

    match format {
        OutputFormat::Text => {
            println!("Number of comments in {} database: {}", output.feed, output.count);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
