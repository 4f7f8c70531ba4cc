//! Configuration parsing for Siphon.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// What the ingestion loop does when the upstream connection drops.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stop the run with an error on the first disconnect
    Fatal,
    /// Re-authenticate and resume polling with exponential backoff
    Resubscribe,
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Siphon: stream comments from a subreddit into a local SQLite store.
#[derive(Parser, Debug, Clone)]
#[command(name = "siphon")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Feed (subreddit) to subscribe to
    #[arg(short = 's', long = "subreddit", env = "SIPHON_FEED", default_value = "soccer")]
    pub feed: String,

    /// Quiet mode: do not echo ingested items to stdout
    #[arg(short, long, env = "SIPHON_QUIET")]
    pub quiet: bool,

    /// Data directory for the per-feed SQLite databases
    #[arg(short, long, env = "SIPHON_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Credentials file (JSON); falls back to SIPHON_CLIENT_ID etc. when absent
    #[arg(short, long, env = "SIPHON_CREDENTIALS", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "SIPHON_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Base URL of the OAuth token endpoint host
    #[arg(long, env = "SIPHON_AUTH_URL", default_value = "https://www.reddit.com")]
    pub auth_url: String,

    /// Base URL of the authenticated API host
    #[arg(long, env = "SIPHON_API_URL", default_value = "https://oauth.reddit.com")]
    pub api_url: String,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "SIPHON_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Delay before re-polling after an empty fetch, in milliseconds
    #[arg(
        long,
        env = "SIPHON_POLL_MIN_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_min_ms: u64,

    /// Upper bound of the empty-fetch backoff, in milliseconds
    #[arg(
        long,
        env = "SIPHON_POLL_MAX_MS",
        default_value_t = 16_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_max_ms: u64,

    /// Behavior when the upstream connection drops
    #[arg(long, env = "SIPHON_RECONNECT", value_enum, default_value_t = ReconnectPolicy::Resubscribe)]
    pub reconnect: ReconnectPolicy,

    /// Consecutive reconnect attempts before giving up
    #[arg(long, env = "SIPHON_MAX_RECONNECTS", default_value_t = 8)]
    pub max_reconnects: u32,

    /// Column width used when echoing comment bodies
    #[arg(long, env = "SIPHON_WRAP_WIDTH", default_value_t = 120)]
    pub wrap_width: usize,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll backoff bounds derived from the configuration.
    pub fn poll_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.poll_min_ms),
            Duration::from_millis(self.poll_max_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: "soccer".into(),
            quiet: false,
            data_dir: PathBuf::from("./data"),
            credentials: PathBuf::from("credentials.json"),
            log_level: "info".into(),
            log_format: LogFormat::Text,
            auth_url: "https://www.reddit.com".into(),
            api_url: "https://oauth.reddit.com".into(),
            request_timeout_secs: 30,
            poll_min_ms: 1000,
            poll_max_ms: 16_000,
            reconnect: ReconnectPolicy::Resubscribe,
            max_reconnects: 8,
            wrap_width: 120,
        }
    }
}

/// Doubling delay between `min` and `max`.
///
/// Used both for re-polling an idle feed and for reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Return the delay to wait now and double the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Go back to the minimum delay after progress was made.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}
