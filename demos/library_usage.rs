//! Example: Using s3clean-rs as a library.
//!
//! This example demonstrates how to:
//! 1. Build a [`Config`] from CLI-style arguments
//! 2. Plug in a custom [`RetryPolicy`]
//! 3. Follow progress events while the deleter runs
//! 4. Inspect the outcome, including every identifier that failed
//!
//! Run with:
//! ```sh
//! cargo run --example library_usage -- s3://my-bucket/prefix/ --worker-size 8
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use s3clean_rs::types::error::is_retryable_error;
use s3clean_rs::{
    BulkDeleter, Config, DeletionStatistics, RetryPolicy, build_config_from_args,
    create_deletion_cancellation_token,
};

// ---------------------------------------------------------------------------
// Custom retry policy: fixed two-second pause, five attempts
// ---------------------------------------------------------------------------

struct FixedDelayPolicy;

impl RetryPolicy for FixedDelayPolicy {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        is_retryable_error(err)
    }

    fn max_attempts(&self) -> u32 {
        5
    }

    fn next_delay(&self, _attempt: u32) -> Result<Duration> {
        Ok(Duration::from_secs(2))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Build Config from real CLI arguments (same parser as the s3clean binary).
    let config: Config =
        build_config_from_args(std::env::args_os()).map_err(|e| anyhow::anyhow!(e))?;
    let targets = config.targets.clone();
    let keep_bucket = config.keep_bucket;

    // 2. Create the deleter with a cancellation token (wire to Ctrl+C if desired).
    let token = create_deletion_cancellation_token();
    let deleter = BulkDeleter::from_config(config, token)
        .await?
        .with_retry_policy(Arc::new(FixedDelayPolicy));

    // 3. Print chunk completions as they happen.
    let stats_receiver = deleter.get_stats_receiver();
    let progress = tokio::spawn(async move {
        while let Ok(event) = stats_receiver.recv().await {
            match event {
                DeletionStatistics::ChunkComplete {
                    chunk_index,
                    deleted,
                    failed,
                } => println!("  chunk {chunk_index}: {deleted} deleted, {failed} failed"),
                DeletionStatistics::PhaseChanged(phase) => println!("phase: {phase:?}"),
                _ => {}
            }
        }
    });

    // 4. Clean up each target and report.
    for target in &targets {
        match deleter.delete_target(target, keep_bucket).await {
            Ok(outcome) => println!("{target}: deleted {}", outcome.deleted_count),
            Err(failure) => {
                eprintln!("{target}: {failure}");
                for failed in &failure.outcome.failed {
                    eprintln!("  {}: {}", failed.identifier, failed.error_code);
                }
            }
        }

        // Counters are reset at the start of every call.
        let stats = deleter.get_deletion_stats();
        println!(
            "  {} listed, {} deleted, {} failed, {} retried",
            stats.stats_listed_objects,
            stats.stats_deleted_objects,
            stats.stats_failed_objects,
            stats.stats_retried_requests,
        );
    }

    deleter.close_stats_sender();
    progress.await?;

    Ok(())
}
