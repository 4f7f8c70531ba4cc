//! Per-feed table definition, pragmas and schema verification.
//!
//! Every feed gets a table named after it:
//!
//! | column               | type    | notes              |
//! |----------------------|---------|--------------------|
//! | `id`                 | TEXT    | primary key        |
//! | `author`             | TEXT    | NULL when deleted  |
//! | `created_at`         | INTEGER | seconds since epoch|
//! | `body`               | TEXT    | verbatim           |
//! | `parent_title`       | TEXT    |                    |
//! | `parent_id`          | TEXT    |                    |
//! | `parent_url`         | TEXT    |                    |
//! | `ingested_at_bucket` | TEXT    | `YYYYMMDDHH`, UTC  |
//!
//! An existing table with any other shape is reported, never altered.

use rusqlite::Connection;
use std::time::Duration;

use crate::name::FeedName;

/// Expected columns of a feed table, in declaration order.
pub const COLUMNS: [(&str, &str); 8] = [
    ("id", "TEXT"),
    ("author", "TEXT"),
    ("created_at", "INTEGER"),
    ("body", "TEXT"),
    ("parent_title", "TEXT"),
    ("parent_id", "TEXT"),
    ("parent_url", "TEXT"),
    ("ingested_at_bucket", "TEXT"),
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shape mismatch between an existing table and [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: String,
    pub found: String,
}

/// Apply durability pragmas to the writer connection.
///
/// WAL lets read-only inspectors run alongside the ingester; `synchronous=FULL`
/// makes every committed upsert survive a crash.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Apply pragmas to read-only connections.
pub fn apply_reader_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "query_only", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

fn create_table_sql(feed: &FeedName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id                 TEXT PRIMARY KEY NOT NULL,
            author             TEXT,
            created_at         INTEGER,
            body               TEXT,
            parent_title       TEXT,
            parent_id          TEXT,
            parent_url         TEXT,
            ingested_at_bucket TEXT NOT NULL
        )
        "#,
        table = feed.quoted()
    )
}

fn create_index_sql(feed: &FeedName) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS \"{feed}_bucket_idx\" ON {table} (ingested_at_bucket)",
        table = feed.quoted()
    )
}

/// Create the feed table if absent and verify its shape.
///
/// Safe to call on every run. Returns `Ok(Err(mismatch))` when the table exists
/// with an incompatible shape; nothing is created or changed in that case.
pub fn initialize_schema(
    conn: &Connection,
    feed: &FeedName,
) -> rusqlite::Result<Result<(), Mismatch>> {
    conn.execute_batch(&create_table_sql(feed))?;

    if let Err(mismatch) = verify_schema(conn, feed)? {
        return Ok(Err(mismatch));
    }

    conn.execute_batch(&create_index_sql(feed))?;
    Ok(Ok(()))
}

/// Compare the existing table against [`COLUMNS`] via `pragma_table_info`.
pub fn verify_schema(conn: &Connection, feed: &FeedName) -> rusqlite::Result<Result<(), Mismatch>> {
    let mut stmt = conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let found = stmt
        .query_map([feed.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let shape_matches = found.len() == COLUMNS.len()
        && found
            .iter()
            .zip(COLUMNS.iter())
            .all(|((name, ty, pk), (want_name, want_ty))| {
                name == want_name
                    && ty.eq_ignore_ascii_case(want_ty)
                    && (*pk == 1) == (*want_name == "id")
            });

    if shape_matches {
        return Ok(Ok(()));
    }

    let describe = |cols: Vec<String>| cols.join(", ");
    Ok(Err(Mismatch {
        expected: describe(
            COLUMNS
                .iter()
                .map(|(name, ty)| {
                    if *name == "id" {
                        format!("{name} {ty} PRIMARY KEY")
                    } else {
                        format!("{name} {ty}")
                    }
                })
                .collect(),
        ),
        found: describe(
            found
                .into_iter()
                .map(|(name, ty, pk)| {
                    if pk > 0 {
                        format!("{name} {ty} PRIMARY KEY")
                    } else {
                        format!("{name} {ty}")
                    }
                })
                .collect(),
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(name: &str) -> FeedName {
        FeedName::parse(name).unwrap()
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let feed = feed("testsub");

        initialize_schema(&conn, &feed).unwrap().unwrap();
        initialize_schema(&conn, &feed).unwrap().unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [feed.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_keyword_feed_name_is_quoted() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, &feed("order")).unwrap().unwrap();
        initialize_schema(&conn, &feed("2020s")).unwrap().unwrap();
    }

    #[test]
    fn test_legacy_table_is_a_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE soccer (user, time, comment, comment_id, post_title, post_id, url, UNIQUE(comment_id))",
        )
        .unwrap();

        let mismatch = initialize_schema(&conn, &feed("soccer")).unwrap().unwrap_err();
        assert!(mismatch.expected.starts_with("id TEXT PRIMARY KEY"));
        assert!(mismatch.found.contains("comment_id"));

        // Nothing was added to the existing table.
        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'soccer_bucket_idx'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 0);
    }

    #[test]
    fn test_missing_primary_key_is_a_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE testsub (id TEXT, author TEXT, created_at INTEGER, body TEXT, \
             parent_title TEXT, parent_id TEXT, parent_url TEXT, ingested_at_bucket TEXT)",
        )
        .unwrap();

        assert!(initialize_schema(&conn, &feed("testsub")).unwrap().is_err());
    }
}
