//! Feed Reader: turns the upstream comment listing into a stream of [`Item`]s.
//!
//! Provides:
//! - [`Item`] normalization from raw upstream records
//! - [`FeedReader`], a lazy, effectively infinite pull-based item sequence
//! - [`reddit::RedditUpstream`], the HTTP client for the real feed
//!
//! Delivery is at-least-once and only approximately ordered by recency.
//! Deduplication is the store's job, not the reader's.

pub mod reader;
pub mod record;
pub mod reddit;

pub use reader::{FeedReader, SeenWindow};
pub use record::{normalize, Item, MalformedRecord, Thing};

use thiserror::Error;

/// Error type for feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Feed not found: {0}")]
    NotFound(String),

    #[error("Malformed record skipped: {0}")]
    Malformed(#[from] MalformedRecord),

    #[error("Upstream disconnected: {0}")]
    Disconnected(String),

    #[error("Unexpected upstream response: {0}")]
    Protocol(String),
}

impl FeedError {
    /// Whether a fresh connection attempt may clear the error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Protocol(_))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Disconnected(err.to_string())
        }
    }
}

/// Raw page source behind a [`FeedReader`].
///
/// Implementations return the newest records first, as the upstream listing does.
#[allow(async_fn_in_trait)]
pub trait Upstream {
    /// Fetch the latest page of records.
    async fn fetch_latest(&mut self) -> Result<Vec<Thing>, FeedError>;

    /// Re-establish the session after a disconnect.
    async fn reconnect(&mut self) -> Result<(), FeedError>;
}

/// Pull-based item source consumed by the ingestion loop.
#[allow(async_fn_in_trait)]
pub trait ItemSource {
    /// Wait for the next item. May block indefinitely on an idle feed.
    async fn next_item(&mut self) -> Result<Item, FeedError>;

    /// Resubscribe after a transient failure.
    async fn reconnect(&mut self) -> Result<(), FeedError> {
        Ok(())
    }
}
