//! Read-only connection pool for inspecting a feed database.
//!
//! Uses r2d2 with r2d2_sqlite for pooled read access.
//! SQLite WAL mode lets inspectors read while the ingester writes.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::path::Path;
use thiserror::Error;

use super::database_path;
use super::schema::apply_reader_pragmas;
use super::store::{bucket_counts, count_rows, get_item, StoredItem};
use crate::name::FeedName;

/// Error type for reader pool operations.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Failed to create connection pool: {0}")]
    PoolCreation(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No database for feed {0}")]
    NoDatabase(String),
}

/// Read-only view of one feed's database.
#[derive(Clone)]
pub struct ReaderPool {
    pool: Pool<SqliteConnectionManager>,
    feed: FeedName,
}

impl ReaderPool {
    /// Create a pool over the database of `feed` in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NoDatabase`] if the feed was never ingested.
    pub fn open(data_dir: &Path, feed: &FeedName, max_size: u32) -> Result<Self, ReaderError> {
        let db_path = database_path(data_dir, feed);
        if !db_path.exists() {
            return Err(ReaderError::NoDatabase(feed.to_string()));
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX);

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_customizer(Box::new(ReaderConnectionCustomizer))
            .build(manager)?;

        Ok(Self {
            pool,
            feed: feed.clone(),
        })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, ReaderError> {
        Ok(self.pool.get()?)
    }

    /// Number of stored items.
    pub fn count(&self) -> Result<u64, ReaderError> {
        let conn = self.get()?;
        Ok(count_rows(&conn, &self.feed)?)
    }

    /// Item counts per ingestion bucket, oldest first.
    pub fn bucket_counts(&self) -> Result<Vec<(String, u64)>, ReaderError> {
        let conn = self.get()?;
        Ok(bucket_counts(&conn, &self.feed)?)
    }

    /// Stored copy of one item.
    pub fn get_item(&self, id: &str) -> Result<Option<StoredItem>, ReaderError> {
        let conn = self.get()?;
        Ok(get_item(&conn, &self.feed, id)?)
    }
}

/// Connection customizer that applies reader pragmas.
#[derive(Debug)]
struct ReaderConnectionCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error>
    for ReaderConnectionCustomizer
{
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        apply_reader_pragmas(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Item;
    use crate::storage::store::IngestStore;
    use tempfile::TempDir;

    #[test]
    fn test_reader_sees_writer_rows() {
        let temp_dir = TempDir::new().unwrap();
        let feed = FeedName::parse("testsub").unwrap();

        let mut store = IngestStore::open(temp_dir.path(), &feed).unwrap();
        store.ensure_schema().unwrap();
        store.upsert(&Item::new("a", "hello")).unwrap();

        let pool = ReaderPool::open(temp_dir.path(), &feed, 2).unwrap();
        assert_eq!(pool.count().unwrap(), 1);

        // Committed writes become visible to pooled readers.
        store.upsert(&Item::new("b", "world")).unwrap();
        assert_eq!(pool.count().unwrap(), 2);
        assert_eq!(
            pool.get_item("b").unwrap().unwrap().item.body.as_deref(),
            Some("world")
        );
        assert_eq!(pool.bucket_counts().unwrap().iter().map(|(_, n)| n).sum::<u64>(), 2);
    }

    #[test]
    fn test_reader_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let feed = FeedName::parse("testsub").unwrap();
        let store = IngestStore::open(temp_dir.path(), &feed).unwrap();
        store.ensure_schema().unwrap();

        let pool = ReaderPool::open(temp_dir.path(), &feed, 1).unwrap();
        let conn = pool.get().unwrap();
        assert!(conn.execute("DELETE FROM testsub", []).is_err());
    }

    #[test]
    fn test_unknown_feed_has_no_database() {
        let temp_dir = TempDir::new().unwrap();
        let feed = FeedName::parse("nothing_here").unwrap();

        assert!(matches!(
            ReaderPool::open(temp_dir.path(), &feed, 1),
            Err(ReaderError::NoDatabase(_))
        ));
    }
}
