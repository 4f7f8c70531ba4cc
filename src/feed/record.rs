//! Upstream records and their normalization into [`Item`]s.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Kind tag of a comment in the upstream listing.
pub const COMMENT_KIND: &str = "t1";

/// Author placeholders the upstream uses for deleted or removed accounts.
const ABSENT_AUTHORS: [&str; 2] = ["[deleted]", "[removed]"];

/// One ingested comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Upstream comment id, the deduplication key.
    pub id: String,
    /// Display name of the author; `None` for deleted or removed accounts.
    pub author: Option<String>,
    /// Creation time reported by the upstream, seconds since the epoch.
    pub created_at: Option<i64>,
    /// Comment text, verbatim.
    pub body: Option<String>,
    pub parent_title: Option<String>,
    pub parent_id: Option<String>,
    pub parent_url: Option<String>,
}

impl Item {
    /// Item with only an id and a body, everything else absent.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            created_at: None,
            body: Some(body.into()),
            parent_title: None,
            parent_id: None,
            parent_url: None,
        }
    }
}

/// A listing child as returned by the upstream: a kind tag and its payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing {
    pub kind: String,
    pub data: Value,
}

/// String field of a payload; absent, null or wrong-typed values are `None`.
fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

/// The comment id. Upstream ids are strings; a bare number is accepted as its decimal form.
fn id_field(data: &Value) -> Option<String> {
    match data.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// A record that could not be turned into an [`Item`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("record has no id")]
    MissingId,

    #[error("unexpected record kind {0:?}")]
    UnexpectedKind(String),
}

/// Normalize an upstream record.
///
/// Each field is read on its own: absent, placeholder or wrong-typed values
/// become `None`. Only a missing id (or a record that is not a comment at all)
/// rejects the record.
pub fn normalize(thing: Thing) -> Result<Item, MalformedRecord> {
    if thing.kind != COMMENT_KIND {
        return Err(MalformedRecord::UnexpectedKind(thing.kind));
    }
    let data = &thing.data;

    let id = id_field(data)
        .filter(|id| !id.trim().is_empty())
        .ok_or(MalformedRecord::MissingId)?;

    let author = str_field(data, "author")
        .filter(|name| !name.is_empty() && !ABSENT_AUTHORS.contains(&name.as_str()));

    Ok(Item {
        id,
        author,
        created_at: data
            .get("created_utc")
            .and_then(Value::as_f64)
            .map(|secs| secs as i64),
        body: str_field(data, "body"),
        parent_title: str_field(data, "link_title"),
        parent_id: str_field(data, "link_id"),
        parent_url: str_field(data, "link_url"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(data: Value) -> Thing {
        Thing {
            kind: COMMENT_KIND.to_string(),
            data,
        }
    }

    #[test]
    fn test_normalize_full_record() {
        let item = normalize(comment(json!({
            "id": "k1x9",
            "author": "someone",
            "created_utc": 1_700_000_000.0,
            "body": "  indented\n\ttext  ",
            "link_title": "Match Thread",
            "link_id": "t3_abc",
            "link_url": "https://example.com/thread",
            "score": 12
        })))
        .unwrap();

        assert_eq!(item.id, "k1x9");
        assert_eq!(item.author.as_deref(), Some("someone"));
        assert_eq!(item.created_at, Some(1_700_000_000));
        assert_eq!(item.body.as_deref(), Some("  indented\n\ttext  "));
        assert_eq!(item.parent_title.as_deref(), Some("Match Thread"));
        assert_eq!(item.parent_id.as_deref(), Some("t3_abc"));
        assert_eq!(item.parent_url.as_deref(), Some("https://example.com/thread"));
    }

    #[test]
    fn test_deleted_author_becomes_none() {
        for author in [json!(null), json!("[deleted]"), json!("[removed]")] {
            let item = normalize(comment(json!({ "id": "a", "author": author, "body": "x" }))).unwrap();
            assert_eq!(item.author, None);
        }

        let item = normalize(comment(json!({ "id": "a" }))).unwrap();
        assert_eq!(item.author, None);
        assert_eq!(item.body, None);
        assert_eq!(item.created_at, None);
    }

    #[test]
    fn test_wrong_typed_fields_become_none() {
        let item = normalize(comment(json!({
            "id": "k1",
            "created_utc": "1700000000",
            "author": 7,
            "body": "kept",
            "link_title": ["not", "a", "string"]
        })))
        .unwrap();

        assert_eq!(item.id, "k1");
        assert_eq!(item.created_at, None);
        assert_eq!(item.author, None);
        assert_eq!(item.body.as_deref(), Some("kept"));
        assert_eq!(item.parent_title, None);

        let item = normalize(comment(json!({ "id": "k2", "created_utc": 1_700_000_000 }))).unwrap();
        assert_eq!(item.created_at, Some(1_700_000_000));
    }

    #[test]
    fn test_missing_id_is_malformed() {
        assert_eq!(
            normalize(comment(json!({ "author": "x", "body": "y" }))),
            Err(MalformedRecord::MissingId)
        );
        assert_eq!(
            normalize(comment(json!({ "id": "  ", "body": "y" }))),
            Err(MalformedRecord::MissingId)
        );
    }

    #[test]
    fn test_wrong_kind_and_unusable_ids_are_malformed() {
        let post = Thing {
            kind: "t3".into(),
            data: json!({ "id": "p" }),
        };
        assert_eq!(
            normalize(post),
            Err(MalformedRecord::UnexpectedKind("t3".into()))
        );

        assert_eq!(
            normalize(comment(json!({ "id": { "nested": true } }))),
            Err(MalformedRecord::MissingId)
        );
        assert_eq!(
            normalize(comment(json!(["not", "an", "object"]))),
            Err(MalformedRecord::MissingId)
        );
        assert_eq!(normalize(comment(json!({ "id": 42 }))).unwrap().id, "42");
    }
}
