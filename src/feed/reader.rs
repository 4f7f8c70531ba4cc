//! Pull-based item sequence over a polled [`Upstream`].
//!
//! Each poll fetches the newest page, drops records already delivered within
//! the [`SeenWindow`], and queues the rest oldest first. A record counts as
//! seen by id and body, so an edited comment is delivered again and its
//! latest copy reaches the store. An empty poll backs off
//! before trying again, so [`FeedReader::next_item`] may wait indefinitely on a
//! quiet feed.

use futures::stream::{self, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use super::record::{normalize, Item, MalformedRecord};
use super::{FeedError, ItemSource, Upstream};
use crate::config::Backoff;
use crate::name::FeedName;

/// Number of recently delivered keys remembered for redelivery suppression.
pub const SEEN_WINDOW_CAPACITY: usize = 301;

/// Bounded set of recently seen keys, evicting the oldest first.
#[derive(Debug)]
pub struct SeenWindow {
    capacity: usize,
    order: VecDeque<String>,
    keys: HashSet<String>,
}

impl SeenWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
        }
    }

    /// Record `key`. Returns false if it was already in the window.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.order.push_back(key.to_string());
        self.keys.insert(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Window key of a delivered item.
fn seen_key(item: &Item) -> String {
    let mut hasher = DefaultHasher::new();
    item.body.hash(&mut hasher);
    format!("{}#{:016x}", item.id, hasher.finish())
}

/// Lazy, effectively infinite sequence of items from one feed.
pub struct FeedReader<U> {
    feed: FeedName,
    upstream: U,
    pending: VecDeque<Result<Item, MalformedRecord>>,
    seen: SeenWindow,
    backoff: Backoff,
}

impl<U: Upstream> FeedReader<U> {
    /// Wrap an already connected upstream.
    pub fn new(feed: FeedName, upstream: U, backoff: Backoff) -> Self {
        Self {
            feed,
            upstream,
            pending: VecDeque::new(),
            seen: SeenWindow::new(SEEN_WINDOW_CAPACITY),
            backoff,
        }
    }

    pub fn feed(&self) -> &FeedName {
        &self.feed
    }

    /// Non-blocking pull: at most one upstream fetch, `Ok(None)` if nothing new.
    pub async fn try_next_item(&mut self) -> Result<Option<Item>, FeedError> {
        if self.pending.is_empty() {
            self.poll_once().await?;
        }
        match self.pending.pop_front() {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(malformed)) => Err(malformed.into()),
            None => Ok(None),
        }
    }

    /// Blocking pull: waits, polling with backoff, until a record arrives.
    pub async fn next_item(&mut self) -> Result<Item, FeedError> {
        self.pull().await
    }

    async fn pull(&mut self) -> Result<Item, FeedError> {
        loop {
            if let Some(next) = self.pending.pop_front() {
                return next.map_err(FeedError::from);
            }

            if self.poll_once().await? == 0 {
                let delay = self.backoff.next_delay();
                tracing::trace!(feed = %self.feed, ?delay, "No new records, backing off");
                tokio::time::sleep(delay).await;
            } else {
                self.backoff.reset();
            }
        }
    }

    /// The same sequence as a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Item, FeedError>> {
        stream::unfold(self, |mut reader| async move {
            let next = reader.pull().await;
            Some((next, reader))
        })
    }

    /// Fetch one page and queue unseen records. Returns the number queued.
    async fn poll_once(&mut self) -> Result<usize, FeedError> {
        let page = self.upstream.fetch_latest().await?;
        let fetched = page.len();
        let mut queued = 0;

        // Pages arrive newest first.
        for thing in page.into_iter().rev() {
            let raw_key = thing.data.to_string();
            match normalize(thing) {
                Ok(item) => {
                    if self.seen.insert(&seen_key(&item)) {
                        self.pending.push_back(Ok(item));
                        queued += 1;
                    }
                }
                Err(malformed) => {
                    if self.seen.insert(&raw_key) {
                        self.pending.push_back(Err(malformed));
                        queued += 1;
                    }
                }
            }
        }

        tracing::debug!(feed = %self.feed, fetched, queued, "Polled upstream");
        Ok(queued)
    }
}

impl<U: Upstream> ItemSource for FeedReader<U> {
    async fn next_item(&mut self) -> Result<Item, FeedError> {
        self.pull().await
    }

    async fn reconnect(&mut self) -> Result<(), FeedError> {
        tracing::info!(feed = %self.feed, "Resubscribing to upstream");
        self.upstream.reconnect().await
    }
}
