//! Upstream API credentials.
//!
//! Loaded from a JSON file shaped like
//!
//! ```json
//! {
//!   "client_id": "...",
//!   "client_secret": "...",
//!   "username": "...",
//!   "password": "...",
//!   "user_agent": "siphon/0.1 by u/someone"
//! }
//! ```
//!
//! or, when the file does not exist, from `SIPHON_CLIENT_ID`,
//! `SIPHON_CLIENT_SECRET`, `SIPHON_USERNAME`, `SIPHON_PASSWORD` and
//! `SIPHON_USER_AGENT`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for credential loading.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Credentials file {0} not found and {1} is not set")]
    MissingEnv(PathBuf, &'static str),
}

/// OAuth script-app credentials, treated as opaque by the ingestion core.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Load credentials from `path`, or from the environment if the file is absent.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "Credentials file absent, reading environment");
            Self::from_env(path)
        }
    }

    /// Parse a credentials JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CredentialsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_env(path: &Path) -> Result<Self, CredentialsError> {
        let var = |name: &'static str| {
            std::env::var(name).map_err(|_| CredentialsError::MissingEnv(path.to_path_buf(), name))
        };
        Ok(Self {
            client_id: var("SIPHON_CLIENT_ID")?,
            client_secret: var("SIPHON_CLIENT_SECRET")?,
            username: var("SIPHON_USERNAME")?,
            password: var("SIPHON_PASSWORD")?,
            user_agent: var("SIPHON_USER_AGENT")?,
        })
    }
}
