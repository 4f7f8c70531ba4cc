//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - Temporary data directory fixtures
//! - Scripted upstreams and listing payloads
//! - Polling helper for asynchronous conditions

#![allow(dead_code)]

use serde_json::{json, Value};
use siphon::credentials::Credentials;
use siphon::feed::{FeedError, Thing, Upstream};
use siphon::name::FeedName;
use siphon::storage::store::IngestStore;
use std::collections::VecDeque;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that manages a temporary data directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for feed databases
    pub temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture with a temporary data directory.
    pub fn new() -> Self {
        siphon::observability::tracing::init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        Self { temp_dir }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Open the store for `feed` with its schema in place.
    pub fn store(&self, feed: &str) -> IngestStore {
        let store = IngestStore::open(self.temp_dir.path(), &feed_name(feed))
            .expect("failed to open store");
        store.ensure_schema().expect("failed to ensure schema");
        store
    }

    /// Write a credentials file and return its path.
    pub fn credentials_file(&self) -> PathBuf {
        let path = self.temp_dir.path().join("credentials.json");
        std::fs::write(&path, credentials_json().to_string()).expect("failed to write credentials");
        path
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

pub fn feed_name(name: &str) -> FeedName {
    FeedName::parse(name).expect("invalid test feed name")
}

pub fn credentials_json() -> Value {
    json!({
        "client_id": "test-client",
        "client_secret": "test-secret",
        "username": "test-user",
        "password": "test-password",
        "user_agent": "siphon-tests/0.1"
    })
}

pub fn credentials() -> Credentials {
    serde_json::from_value(credentials_json()).expect("invalid test credentials")
}

/// Comment payload as it appears inside a listing child.
pub fn comment_data(id: &str, author: &str, body: &str) -> Value {
    json!({
        "id": id,
        "author": author,
        "body": body,
        "created_utc": 1_700_000_000.0,
        "link_title": "Match Thread",
        "link_id": "t3_thread",
        "link_url": "https://www.reddit.com/r/testsub/comments/thread/"
    })
}

pub fn comment(id: &str, body: &str) -> Thing {
    Thing {
        kind: "t1".to_string(),
        data: comment_data(id, "someone", body),
    }
}

/// Listing response body with `children` newest first.
pub fn listing(children: Vec<Value>) -> Value {
    let children: Vec<Value> = children
        .into_iter()
        .map(|data| json!({ "kind": "t1", "data": data }))
        .collect();
    json!({ "kind": "Listing", "data": { "after": null, "children": children } })
}

/// Upstream replaying fixed pages, then empty pages forever.
pub struct PageScript {
    pages: VecDeque<Vec<Thing>>,
}

impl PageScript {
    pub fn new(pages: Vec<Vec<Thing>>) -> Self {
        Self {
            pages: pages.into(),
        }
    }
}

impl Upstream for PageScript {
    async fn fetch_latest(&mut self) -> Result<Vec<Thing>, FeedError> {
        Ok(self.pages.pop_front().unwrap_or_default())
    }

    async fn reconnect(&mut self) -> Result<(), FeedError> {
        Ok(())
    }
}

/// Wait for a condition to become true with timeout.
///
/// # Arguments
///
/// * `timeout` - Maximum time to wait
/// * `condition` - Closure that returns true when condition is met
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.temp_dir.path().exists());
        assert!(fixture.credentials_file().exists());
    }
}
