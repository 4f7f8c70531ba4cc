//! siphonctl: Command-line inspector for Siphon feed databases.
//!
//! Reads the per-feed SQLite files through a read-only pool, so it can run
//! while `siphon` is still ingesting.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line inspector for Siphon feed databases.
#[derive(Parser)]
#[command(name = "siphonctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory holding the per-feed databases
    #[arg(short, long, env = "SIPHON_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the number of stored items for a feed
    Count {
        /// Feed (subreddit) name
        feed: String,
    },
    /// Print item counts per ingestion bucket (UTC day and hour)
    Buckets {
        /// Feed (subreddit) name
        feed: String,
    },
    /// Show one stored item
    Show {
        /// Feed (subreddit) name
        feed: String,
        /// Item id
        id: String,
    },
}

fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Count { feed } => commands::count::run(&cli.data_dir, &feed, cli.output)?,
        Commands::Buckets { feed } => commands::buckets::run(&cli.data_dir, &feed, cli.output)?,
        Commands::Show { feed, id } => commands::show::run(&cli.data_dir, &feed, &id, cli.output)?,
    }

    Ok(())
}
