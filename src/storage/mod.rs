//! SQLite storage layer for Siphon.
//!
//! Provides:
//! - Schema creation and verification, one database and one table per feed
//! - The single-writer [`store::IngestStore`] with transactional upserts
//! - A read-only connection pool for inspection tools

pub mod reader;
pub mod schema;
pub mod store;

use std::path::{Path, PathBuf};

use crate::name::FeedName;

/// Path of the database file backing `feed`.
pub fn database_path(data_dir: &Path, feed: &FeedName) -> PathBuf {
    data_dir.join(format!("{feed}.db"))
}
