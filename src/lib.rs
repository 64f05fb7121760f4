/*!
# Overview
s3clean-rs empties and deletes Amazon S3 buckets quickly.
It lists every object version and delete marker, then removes them with
batch delete requests (up to 1000 keys each) running concurrently under a
fixed worker ceiling.

## Features
- **Bounded concurrency**: at most `worker_size` batch requests in flight
- **Per-key results**: keys the store refuses are reported one by one
- **Jittered retries**: throttling, 5xx and network errors are retried per batch
- **Partial-failure isolation**: one failed batch never affects its siblings,
  and a bucket is only deleted once all of its contents are gone
- **Cancellation**: Ctrl+C stops new work and returns the partial outcome
- **Library-first**: the s3clean CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
s3clean-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3clean_rs::config::args::parse_from_args;
use s3clean_rs::{BulkDeleter, Config, create_deletion_cancellation_token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = vec!["s3clean", "s3://my-bucket/logs/"];

    let config = Config::try_from(parse_from_args(args)?).map_err(anyhow::Error::msg)?;
    let target = config.targets[0].clone();
    let deleter = BulkDeleter::from_config(config, create_deletion_cancellation_token()).await?;
    deleter.close_stats_sender();

    match deleter.delete_target(&target, false).await {
        Ok(outcome) => println!("deleted {} objects", outcome.deleted_count),
        Err(failure) => {
            for failed in &failure.outcome.failed {
                eprintln!("{}: {}", failed.identifier, failed.error_code);
            }
            std::process::exit(failure.exit_code());
        }
    }
    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]
#![allow(clippy::assertions_on_constants)]
#![allow(clippy::unnecessary_unwrap)]

pub mod config;
pub mod deleter;
pub mod lister;
pub mod retry;
pub mod storage;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use deleter::BulkDeleter;
pub use retry::{JitterRetryPolicy, RetryDecision, RetryPolicy, RetryPolicyConfig};
pub use storage::{Storage, StorageTrait};
pub use types::error::{
    DeletionError, DeletionFailure, S3cleanError, exit_code_from_error, is_cancelled_error,
};
pub use types::token::{DeletionCancellationToken, create_deletion_cancellation_token};
pub use types::{
    BucketTarget, DeleteOutcome, DeletionStatistics, DeletionStats, FailedIdentifier,
    ObjectIdentifier, ObjectIdentifierSet, OutcomeStatus,
};
pub use validation::{Bucket, Region, ValidationError};
