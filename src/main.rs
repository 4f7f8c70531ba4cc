//! Siphon: stream a subreddit's comments into a local SQLite database.
//!
//! # Usage
//!
//! ```bash
//! siphon --subreddit soccer --data-dir ./data
//! siphon -s soccer --quiet
//! ```
//!
//! Environment variables can also be used:
//! - `SIPHON_FEED`: Subreddit to follow
//! - `SIPHON_DATA_DIR`: Data directory for the per-feed databases
//! - `SIPHON_CREDENTIALS`: Path to the credentials JSON file
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use siphon::config::Config;
use siphon::credentials::Credentials;
use siphon::echo::Echo;
use siphon::feed::reddit::{RedditUpstream, UpstreamConfig};
use siphon::feed::FeedReader;
use siphon::ingest::{self, IngestOptions};
use siphon::name::FeedName;
use siphon::observability::tracing::init_tracing;
use siphon::storage::store::IngestStore;
use std::fs;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Siphon v{} - comment feed ingester

  Configuration:
    Feed:       r/{}
    Data Dir:   {}
    Echo:       {}
    Reconnect:  {:?}

  Press Ctrl+C to stop and save.
-----------------------------------------------------------
"#,
        version,
        config.feed,
        config.data_dir.display(),
        if config.quiet { "off" } else { "on" },
        config.reconnect
    );
}

/// Flip the cancellation flag on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            tracing::info!("Received SIGINT (Ctrl+C), stopping stream...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, stopping stream...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    if let Err(e) = ctrl_c.await {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        return;
                    }
                    tracing::info!("Received SIGINT (Ctrl+C), stopping stream...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            tracing::info!("Received Ctrl+C, stopping stream...");
        }

        let _ = shutdown_tx.send(true);
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level, config.log_format);

    // Validate the feed name before it touches the filesystem or the API
    let feed = FeedName::parse(&config.feed)?;

    let credentials = Credentials::load(&config.credentials)?;

    // Ensure data directory exists
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    print_banner(&config);

    // Cancellation is requested by signal and observed between pulls
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let upstream = RedditUpstream::connect(credentials, feed.clone(), UpstreamConfig::from(&config))
        .await
        .with_context(|| format!("failed to open feed r/{feed}"))?;
    let mut reader = FeedReader::new(feed.clone(), upstream, config.poll_backoff());

    let mut store = IngestStore::open(&config.data_dir, &feed)?;
    store.ensure_schema()?;

    let echo = if config.quiet {
        Echo::disabled()
    } else {
        Echo::stdout(config.wrap_width)
    };
    let options = IngestOptions::from(&config);

    let result = ingest::run(&mut reader, &mut store, &options, shutdown_rx, |item| {
        echo.print(item);
    })
    .await;
    echo.finish().await;
    let report = result?;

    if let Some(count) = report.final_count {
        println!("\nNumber of comments in {feed} database: {count}");
    }

    tracing::info!("Siphon shutdown complete");
    Ok(())
}
