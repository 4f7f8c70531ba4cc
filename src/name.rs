//! Validated feed names.
//!
//! A feed name ends up naming a database file and a table, so it is checked
//! against an allow-list once at startup and carried as [`FeedName`] from then on.

use std::fmt;
use thiserror::Error;

/// Longest accepted feed name.
pub const MAX_FEED_NAME_LEN: usize = 64;

/// A feed name rejected by [`FeedName::parse`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid feed name {name:?}: {reason}")]
pub struct InvalidFeedName {
    pub name: String,
    pub reason: &'static str,
}

/// Feed name restricted to ASCII letters, digits and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedName(String);

impl FeedName {
    /// Validate `name` against the allow-list.
    ///
    /// # Example
    ///
    /// ```
    /// use siphon::name::FeedName;
    ///
    /// assert!(FeedName::parse("AskHistorians").is_ok());
    /// assert!(FeedName::parse("x; DROP TABLE y").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self, InvalidFeedName> {
        let reject = |reason| InvalidFeedName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(reject("name cannot be empty"));
        }
        if name.len() > MAX_FEED_NAME_LEN {
            return Err(reject("name too long (max 64 characters)"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(reject(
                "name must contain only alphanumeric characters or underscores",
            ));
        }
        if name.to_ascii_lowercase().starts_with("sqlite_") {
            return Err(reject("names starting with sqlite_ are reserved"));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a double-quoted SQL identifier.
    ///
    /// The allow-list already excludes quotes; quoting keeps names such as
    /// `2020s` or `order` valid identifiers.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for FeedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
