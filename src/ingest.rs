//! The ingestion loop: pull from an [`ItemSource`], upsert into an [`IngestStore`].
//!
//! The loop is `Streaming` from the first pull until it is `Stopped`, either by
//! the cancellation signal (clean) or by a fatal error. Cancellation is checked
//! before every pull and may interrupt a pull or a resubscription that is
//! waiting on the upstream, but never an upsert: an item that has been pulled
//! is always written in full before the loop stops.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{Backoff, Config, ReconnectPolicy};
use crate::feed::{FeedError, Item, ItemSource};
use crate::storage::store::{IngestStore, StoreError};

/// Error that stops the loop.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Gave up after {attempts} reconnect attempts: {source}")]
    ReconnectsExhausted {
        attempts: u32,
        #[source]
        source: FeedError,
    },
}

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub reconnect: ReconnectPolicy,
    pub max_reconnects: u32,
    pub reconnect_backoff: Backoff,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::Resubscribe,
            max_reconnects: 8,
            reconnect_backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
        }
    }
}

impl From<&Config> for IngestOptions {
    fn from(config: &Config) -> Self {
        Self {
            reconnect: config.reconnect,
            max_reconnects: config.max_reconnects,
            ..Self::default()
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items upserted, replays included.
    pub ingested: u64,
    /// Malformed records skipped.
    pub skipped: u64,
    /// Successful resubscriptions.
    pub reconnects: u32,
    /// Row count after the loop stopped, if the store could still be read.
    pub final_count: Option<u64>,
}

/// Resolves once cancellation is requested. Never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run the loop until cancelled or a fatal error.
///
/// `on_item` is called after each successful upsert.
pub async fn run<S, F>(
    source: &mut S,
    store: &mut IngestStore,
    options: &IngestOptions,
    mut cancel: watch::Receiver<bool>,
    mut on_item: F,
) -> Result<IngestReport, IngestError>
where
    S: ItemSource,
    F: FnMut(&Item),
{
    let feed = store.feed().clone();
    let mut report = IngestReport::default();
    let mut backoff = options.reconnect_backoff;
    let mut attempts = 0u32;

    tracing::info!(%feed, "Streaming");

    let outcome: Result<(), IngestError> = loop {
        if *cancel.borrow() {
            break Ok(());
        }

        let pulled = tokio::select! {
            biased;
            () = cancelled(&mut cancel) => break Ok(()),
            next = source.next_item() => next,
        };

        match pulled {
            Ok(item) => {
                if let Err(e) = store.upsert(&item) {
                    break Err(e.into());
                }
                report.ingested += 1;
                attempts = 0;
                backoff.reset();
                tracing::debug!(%feed, item_id = %item.id, "Ingested item");
                on_item(&item);
            }
            Err(FeedError::Malformed(malformed)) => {
                report.skipped += 1;
                tracing::warn!(%feed, error = %malformed, "Skipping malformed record");
            }
            Err(e) if e.is_transient() && options.reconnect == ReconnectPolicy::Resubscribe => {
                attempts += 1;
                if attempts > options.max_reconnects {
                    break Err(IngestError::ReconnectsExhausted {
                        attempts: attempts - 1,
                        source: e,
                    });
                }

                let delay = backoff.next_delay();
                tracing::warn!(%feed, error = %e, attempt = attempts, ?delay, "Upstream disconnected, resubscribing");
                tokio::select! {
                    biased;
                    () = cancelled(&mut cancel) => break Ok(()),
                    () = tokio::time::sleep(delay) => {}
                }

                let reconnected = tokio::select! {
                    biased;
                    () = cancelled(&mut cancel) => break Ok(()),
                    result = source.reconnect() => result,
                };
                match reconnected {
                    Ok(()) => report.reconnects += 1,
                    Err(e) if e.is_transient() => {
                        tracing::warn!(%feed, error = %e, "Resubscribe failed");
                    }
                    Err(e) => break Err(e.into()),
                }
            }
            Err(e) => break Err(e.into()),
        }
    };

    // Runs on every exit path.
    report.final_count = match store.count() {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(%feed, error = %e, "Could not read final row count");
            None
        }
    };

    match &outcome {
        Ok(()) => tracing::info!(
            %feed,
            ingested = report.ingested,
            skipped = report.skipped,
            final_count = ?report.final_count,
            "Stopped after cancellation"
        ),
        Err(e) => tracing::error!(
            %feed,
            error = %e,
            ingested = report.ingested,
            final_count = ?report.final_count,
            "Stopped on fatal error"
        ),
    }

    outcome.map(|()| report)
}
