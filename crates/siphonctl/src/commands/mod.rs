//! Subcommand implementations.

pub mod buckets;
pub mod count;
pub mod show;

use anyhow::{Context, Result};
use siphon::name::FeedName;
use siphon::storage::reader::ReaderPool;
use std::path::Path;

/// Open a single-connection read-only pool on `feed`.
pub fn open_feed(data_dir: &Path, feed: &str) -> Result<(FeedName, ReaderPool)> {
    let feed = FeedName::parse(feed)?;
    let pool = ReaderPool::open(data_dir, &feed, 1)
        .with_context(|| format!("failed to open database for {feed}"))?;
    Ok((feed, pool))
}
