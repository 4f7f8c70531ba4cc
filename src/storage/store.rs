//! Ingest Store: durable, idempotent persistence of feed items.
//!
//! One `IngestStore` owns the only writer connection to a feed's database.
//! Each upsert runs in its own transaction, so readers see either the previous
//! row or the complete new one.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::database_path;
use super::schema::{apply_pragmas, initialize_schema};
use crate::feed::Item;
use crate::ingestion_bucket;
use crate::name::FeedName;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Table {table} has an incompatible schema: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },
}

/// An item as persisted, with the bucket assigned at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub item: Item,
    pub ingested_at_bucket: String,
}

const SELECT_COLUMNS: &str =
    "id, author, created_at, body, parent_title, parent_id, parent_url, ingested_at_bucket";

fn stored_item_from_row(row: &Row<'_>) -> rusqlite::Result<StoredItem> {
    Ok(StoredItem {
        item: Item {
            id: row.get(0)?,
            author: row.get(1)?,
            created_at: row.get(2)?,
            body: row.get(3)?,
            parent_title: row.get(4)?,
            parent_id: row.get(5)?,
            parent_url: row.get(6)?,
        },
        ingested_at_bucket: row.get(7)?,
    })
}

/// Number of rows in the feed table.
pub(crate) fn count_rows(conn: &Connection, feed: &FeedName) -> rusqlite::Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", feed.quoted());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Row counts per ingestion bucket, oldest bucket first.
pub(crate) fn bucket_counts(conn: &Connection, feed: &FeedName) -> rusqlite::Result<Vec<(String, u64)>> {
    let sql = format!(
        "SELECT ingested_at_bucket, COUNT(*) FROM {} GROUP BY ingested_at_bucket ORDER BY ingested_at_bucket ASC",
        feed.quoted()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look up one row by id.
pub(crate) fn get_item(
    conn: &Connection,
    feed: &FeedName,
    id: &str,
) -> rusqlite::Result<Option<StoredItem>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?1", feed.quoted());
    conn.query_row(&sql, [id], stored_item_from_row).optional()
}

/// Single-writer store for one feed.
pub struct IngestStore {
    conn: Connection,
    feed: FeedName,
    path: PathBuf,
    upsert_sql: String,
}

impl IngestStore {
    /// Open (creating if needed) the database for `feed` under `data_dir`.
    ///
    /// The directory must already exist.
    pub fn open(data_dir: &Path, feed: &FeedName) -> Result<Self, StoreError> {
        let path = database_path(data_dir, feed);
        let unavailable = |source| StoreError::Unavailable {
            path: path.clone(),
            source,
        };

        let conn = Connection::open(&path).map_err(unavailable)?;
        apply_pragmas(&conn).map_err(unavailable)?;

        tracing::debug!(feed = %feed, path = %path.display(), "Opened ingest store");
        Ok(Self::with_connection(conn, feed.clone(), path))
    }

    /// Wrap an in-memory database, for tests and dry runs.
    pub fn open_in_memory(feed: &FeedName) -> Result<Self, StoreError> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Unavailable {
            path: path.clone(),
            source,
        })?;
        Ok(Self::with_connection(conn, feed.clone(), path))
    }

    fn with_connection(conn: Connection, feed: FeedName, path: PathBuf) -> Self {
        let upsert_sql = format!(
            r#"
            INSERT INTO {table} ({SELECT_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
              author=excluded.author,
              created_at=excluded.created_at,
              body=excluded.body,
              parent_title=excluded.parent_title,
              parent_id=excluded.parent_id,
              parent_url=excluded.parent_url,
              ingested_at_bucket=excluded.ingested_at_bucket
            "#,
            table = feed.quoted()
        );
        Self {
            conn,
            feed,
            path,
            upsert_sql,
        }
    }

    pub fn feed(&self) -> &FeedName {
        &self.feed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: rusqlite::Error) -> StoreError {
        StoreError::Unavailable {
            path: self.path.clone(),
            source,
        }
    }

    /// Create the feed table if absent; fail on an incompatible existing one.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        initialize_schema(&self.conn, &self.feed)
            .map_err(|e| self.unavailable(e))?
            .map_err(|mismatch| StoreError::SchemaMismatch {
                table: self.feed.to_string(),
                expected: mismatch.expected,
                found: mismatch.found,
            })
    }

    /// Insert `item`, replacing any row with the same id. Buckets by the current time.
    pub fn upsert(&mut self, item: &Item) -> Result<(), StoreError> {
        self.upsert_at(item, Utc::now())
    }

    /// Insert `item` as if ingested at `at`.
    pub fn upsert_at(&mut self, item: &Item, at: DateTime<Utc>) -> Result<(), StoreError> {
        let bucket = ingestion_bucket(at);

        let tx = self.conn.transaction().map_err(|e| StoreError::Unavailable {
            path: self.path.clone(),
            source: e,
        })?;
        let written = tx
            .execute(
                &self.upsert_sql,
                params![
                    item.id,
                    item.author,
                    item.created_at,
                    item.body,
                    item.parent_title,
                    item.parent_id,
                    item.parent_url,
                    bucket,
                ],
            )
            .and_then(|_| tx.commit());

        written.map_err(|e| self.unavailable(e))?;
        tracing::trace!(feed = %self.feed, item_id = %item.id, %bucket, "Upserted item");
        Ok(())
    }

    /// Current row count.
    pub fn count(&self) -> Result<u64, StoreError> {
        count_rows(&self.conn, &self.feed).map_err(|e| self.unavailable(e))
    }

    /// Stored copy of `id`, if any.
    pub fn get(&self, id: &str) -> Result<Option<StoredItem>, StoreError> {
        get_item(&self.conn, &self.feed, id).map_err(|e| self.unavailable(e))
    }

    /// Row counts per ingestion bucket.
    pub fn bucket_counts(&self) -> Result<Vec<(String, u64)>, StoreError> {
        bucket_counts(&self.conn, &self.feed).map_err(|e| self.unavailable(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn testsub() -> FeedName {
        FeedName::parse("testsub").unwrap()
    }

    fn memory_store() -> IngestStore {
        let store = IngestStore::open_in_memory(&testsub()).unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_upsert_same_id_keeps_last_write() {
        let mut store = memory_store();

        store.upsert(&Item::new("a", "hello")).unwrap();
        store.upsert(&Item::new("a", "hello again")).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let row = store.get("a").unwrap().unwrap();
        assert_eq!(row.item.body.as_deref(), Some("hello again"));
    }

    #[test]
    fn test_one_row_per_distinct_id() {
        let mut store = memory_store();

        for id in ["a", "b", "a", "c", "b", "a"] {
            store.upsert(&Item::new(id, format!("body of {id}"))).unwrap();
        }

        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_optional_fields_round_trip_as_null() {
        let mut store = memory_store();
        let item = Item {
            id: "x".into(),
            author: None,
            created_at: Some(1_700_000_000),
            body: None,
            parent_title: Some("Daily Discussion".into()),
            parent_id: Some("t3_q".into()),
            parent_url: None,
        };
        store.upsert(&item).unwrap();

        let row = store.get("x").unwrap().unwrap();
        assert_eq!(row.item, item);

        let authors: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM testsub WHERE author IS NULL", [], |r| r.get(0))
            .unwrap();
        assert_eq!(authors, 1);
    }

    #[test]
    fn test_bucket_recorded_at_insert_time() {
        let mut store = memory_store();
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();

        store.upsert_at(&Item::new("a", "1"), morning).unwrap();
        store.upsert_at(&Item::new("b", "2"), morning).unwrap();
        store.upsert_at(&Item::new("c", "3"), evening).unwrap();

        assert_eq!(store.get("a").unwrap().unwrap().ingested_at_bucket, "2024050109");
        assert_eq!(
            store.bucket_counts().unwrap(),
            vec![("2024050109".to_string(), 2), ("2024050121".to_string(), 1)]
        );

        // A replay moves the row to the bucket of its latest copy.
        store.upsert_at(&Item::new("a", "1"), evening).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().ingested_at_bucket, "2024050121");
    }

    #[test]
    fn test_ensure_schema_twice_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IngestStore::open(temp_dir.path(), &testsub()).unwrap();
        store.ensure_schema().unwrap();
        store.upsert(&Item::new("a", "hello")).unwrap();

        store.ensure_schema().unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.path().ends_with("testsub.db"));
    }

    #[test]
    fn test_rows_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut store = IngestStore::open(temp_dir.path(), &testsub()).unwrap();
            store.ensure_schema().unwrap();
            store.upsert(&Item::new("a", "hello")).unwrap();
        }

        let mut store = IngestStore::open(temp_dir.path(), &testsub()).unwrap();
        store.ensure_schema().unwrap();
        store.upsert(&Item::new("a", "hello")).unwrap();
        store.upsert(&Item::new("b", "world")).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_incompatible_table_is_schema_mismatch() {
        let store = IngestStore::open_in_memory(&testsub()).unwrap();
        store
            .conn
            .execute_batch("CREATE TABLE testsub (comment_id TEXT UNIQUE, comment TEXT)")
            .unwrap();

        assert!(matches!(
            store.ensure_schema(),
            Err(StoreError::SchemaMismatch { ref table, .. }) if table == "testsub"
        ));
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does/not/exist");

        assert!(matches!(
            IngestStore::open(&missing, &testsub()),
            Err(StoreError::Unavailable { .. })
        ));
    }
}
