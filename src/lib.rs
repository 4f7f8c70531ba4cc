//! Siphon: resumable, deduplicated ingestion of a comment feed into SQLite.
//!
//! Siphon subscribes to one discussion feed (a subreddit), normalizes every
//! comment it sees into an [`feed::Item`] and upserts it into a per-feed
//! SQLite database. Replaying the feed after a restart is harmless: rows are
//! keyed by the upstream comment id and the latest copy wins.
//!
//! # Architecture
//!
//! - **Feed Reader**: polls the upstream listing and yields items oldest first
//! - **Ingest Store**: one database and one table per feed, transactional upserts
//! - **Ingestion Loop**: pull, upsert, repeat until cancelled or a fatal error
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`credentials`]: upstream API credentials
//! - [`echo`]: console rendering of ingested items
//! - [`feed`]: upstream client, normalization and the item stream
//! - [`ingest`]: the ingestion loop and its cancellation contract
//! - [`name`]: feed name validation
//! - [`observability`]: tracing setup
//! - [`storage`]: SQLite persistence layer

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // feed::FeedReader is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::struct_excessive_bools,     // Config structs may have flags
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod config;
pub mod credentials;
pub mod echo;
pub mod feed;
pub mod ingest;
pub mod name;
pub mod observability;
pub mod storage;

use chrono::{DateTime, Utc};

/// Format of the coarse ingestion-time bucket (UTC day and hour).
pub const BUCKET_FORMAT: &str = "%Y%m%d%H";

/// Compute the ingestion bucket for the given instant.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 0).unwrap();
/// assert_eq!(siphon::ingestion_bucket(at), "2024030917");
/// ```
#[must_use]
pub fn ingestion_bucket(at: DateTime<Utc>) -> String {
    at.format(BUCKET_FORMAT).to_string()
}
