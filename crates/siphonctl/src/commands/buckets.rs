//! Buckets command implementation.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::open_feed;
use crate::OutputFormat;

#[derive(Serialize)]
struct BucketInfo {
    bucket: String,
    count: u64,
}

#[derive(Serialize)]
struct BucketsOutput {
    feed: String,
    buckets: Vec<BucketInfo>,
    total: u64,
}

pub fn run(data_dir: &Path, feed: &str, format: OutputFormat) -> Result<()> {
    let (feed, pool) = open_feed(data_dir, feed)?;
    let buckets: Vec<BucketInfo> = pool
        .bucket_counts()?
        .into_iter()
        .map(|(bucket, count)| BucketInfo { bucket, count })
        .collect();

    let output = BucketsOutput {
        feed: feed.to_string(),
        total: buckets.iter().map(|b| b.count).sum(),
        buckets,
    };

    match format {
        OutputFormat::Text => {
            if output.buckets.is_empty() {
                println!("No comments stored for {}.", output.feed);
            } else {
                println!("{:<20} {:>10}", "BUCKET (UTC)", "COMMENTS");
                println!("{}", "-".repeat(31));
                for bucket in &output.buckets {
                    println!("{:<20} {:>10}", display_bucket(&bucket.bucket), bucket.count);
                }
                println!();
                println!("Total: {} comment(s)", output.total);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// `2024050109` -> `2024-05-01 09:00`; anything else is shown as stored.
fn display_bucket(bucket: &str) -> String {
    if bucket.len() == 10 && bucket.chars().all(|c| c.is_ascii_digit()) {
        format!(
            "{}-{}-{} {}:00",
            &bucket[0..4],
            &bucket[4..6],
            &bucket[6..8],
            &bucket[8..10]
        )
    } else {
        bucket.to_string()
    }
}
