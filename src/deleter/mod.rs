//! Bulk delete orchestrator.
//!
//! [`BulkDeleter`] drives one call through its phases:
//!
//! ```text
//! Idle → ResolvingRegion → Listing (optional) → Chunking → Dispatching → Aggregating → Done
//! ```
//!
//! Chunks are dispatched as tokio tasks in a `JoinSet`. Each task holds an
//! owned semaphore permit for its whole lifetime, so at most `worker_size`
//! batch requests are in flight at any time. A failed chunk does not cancel
//! its siblings unless `abort_on_failure` is set.

use std::sync::Arc;

use anyhow::anyhow;
use async_channel::{Receiver, Sender};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::lister::ObjectLister;
use crate::retry::{JitterRetryPolicy, RetryPolicy};
use crate::storage::{self, Storage};
use crate::types::error::{DeletionFailure, S3cleanError, is_cancelled_error};
use crate::types::token::DeletionCancellationToken;
use crate::types::{
    BucketTarget, DeleteOutcome, DeletionPhase, DeletionStatistics, DeletionStats,
    DeletionStatsReport, FailedIdentifier, ObjectIdentifierSet, OutcomeStatus,
};
use crate::validation::{Bucket, Region};

pub mod batch;

use batch::{ChunkDeleter, ChunkResult};

type DeleteResult = Result<DeleteOutcome, DeletionFailure>;

/// Concurrent bulk deleter for S3 objects, object versions and buckets.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use s3clean_rs::{BulkDeleter, Config, create_deletion_cancellation_token};
///
/// # let config: Config = todo!();
/// let deleter = BulkDeleter::from_config(config, create_deletion_cancellation_token()).await?;
/// match deleter.delete_all("my-bucket").await {
///     Ok(outcome) => println!("deleted {}", outcome.deleted_count),
///     Err(failure) => eprintln!("{} failed: {}", failure.outcome.failed_count(), failure),
/// }
/// # Ok(())
/// # }
/// ```
pub struct BulkDeleter {
    config: Config,
    storage: Storage,
    retry_policy: Arc<dyn RetryPolicy>,
    cancellation_token: DeletionCancellationToken,
    stats_sender: Sender<DeletionStatistics>,
    stats_receiver: Receiver<DeletionStatistics>,
    deletion_stats_report: Arc<DeletionStatsReport>,
}

impl BulkDeleter {
    /// Create a deleter over an existing storage handle.
    ///
    /// The retry policy is a [`JitterRetryPolicy`] built from
    /// `config.retry_policy_config`.
    pub fn new(
        config: Config,
        storage: Storage,
        cancellation_token: DeletionCancellationToken,
    ) -> Self {
        // Create unbounded stats channel
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let retry_policy = Arc::new(JitterRetryPolicy::from(config.retry_policy_config));

        Self {
            config,
            storage,
            retry_policy,
            cancellation_token,
            stats_sender,
            stats_receiver,
            deletion_stats_report: Arc::new(DeletionStatsReport::new()),
        }
    }

    /// Create a deleter backed by S3, using `config.target_client_config`.
    pub async fn from_config(
        config: Config,
        cancellation_token: DeletionCancellationToken,
    ) -> anyhow::Result<Self> {
        let client_config = config.target_client_config.as_ref().ok_or_else(|| {
            anyhow!(S3cleanError::Precondition(
                "no S3 client configuration given".to_string()
            ))
        })?;
        let storage = storage::create_storage(client_config).await;

        Ok(Self::new(config, storage, cancellation_token))
    }

    /// Replace the retry policy used for chunk requests.
    pub fn with_retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Receiver for progress events. Every clone sees each event once.
    pub fn get_stats_receiver(&self) -> Receiver<DeletionStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats channel so receivers finish once drained.
    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }

    /// Counters of the most recent call. They are reset when a call starts.
    pub fn get_deletion_stats(&self) -> DeletionStats {
        self.deletion_stats_report.snapshot()
    }

    /// Delete the given identifiers from `bucket`.
    ///
    /// An empty set succeeds with a zero count without touching the store.
    pub async fn delete_set(&self, bucket: &str, identifiers: &ObjectIdentifierSet) -> DeleteResult {
        self.begin_call().await;
        let bucket = self.validate(bucket)?;

        if identifiers.is_empty() {
            debug!(bucket = %bucket, "nothing to delete.");
            self.enter_phase(DeletionPhase::Done(OutcomeStatus::Success))
                .await;
            return Ok(DeleteOutcome::default());
        }

        let region = self.resolve_region(&bucket).await?;
        self.dispatch(&bucket, region, identifiers).await
    }

    /// Delete every object version and delete marker in `bucket`.
    pub async fn delete_all(&self, bucket: &str) -> DeleteResult {
        self.begin_call().await;
        let bucket = self.validate(bucket)?;
        self.delete_listed(&bucket, None).await.map(|(outcome, _)| outcome)
    }

    /// Delete every object version and delete marker under `prefix`.
    pub async fn delete_prefix(&self, bucket: &str, prefix: &str) -> DeleteResult {
        self.begin_call().await;
        let bucket = self.validate(bucket)?;
        let prefix = Some(prefix).filter(|p| !p.is_empty());
        self.delete_listed(&bucket, prefix)
            .await
            .map(|(outcome, _)| outcome)
    }

    /// Empty `bucket`, then delete it.
    ///
    /// The bucket itself is only deleted when every listed identifier was
    /// deleted.
    pub async fn delete_bucket_and_contents(&self, bucket: &str) -> DeleteResult {
        self.begin_call().await;
        let bucket = self.validate(bucket)?;
        self.empty_and_delete_bucket(&bucket).await
    }

    /// Clean up one parsed CLI target.
    ///
    /// A target with a key prefix only deletes under that prefix. A bare
    /// bucket is emptied, and deleted as well unless `keep_bucket` is set.
    pub async fn delete_target(&self, target: &BucketTarget, keep_bucket: bool) -> DeleteResult {
        self.begin_call().await;
        self.validate_region()?;

        match (&target.key, keep_bucket) {
            (Some(prefix), _) => self
                .delete_listed(&target.bucket, Some(prefix.as_str()))
                .await
                .map(|(outcome, _)| outcome),
            (None, true) => self
                .delete_listed(&target.bucket, None)
                .await
                .map(|(outcome, _)| outcome),
            (None, false) => self.empty_and_delete_bucket(&target.bucket).await,
        }
    }

    async fn empty_and_delete_bucket(&self, bucket: &Bucket) -> DeleteResult {
        let (mut outcome, region) = self.delete_listed(bucket, None).await?;

        info!(bucket = %bucket, region = %region, "deleting bucket.");
        if let Err(e) = self.storage.delete_bucket(bucket, region).await {
            error!(bucket = %bucket, error = format!("{e:#}"), "failed to delete bucket.");
            // The contents are gone but the call as a whole did not succeed.
            outcome.status = OutcomeStatus::FatalFailure;
            self.enter_phase(DeletionPhase::Done(OutcomeStatus::FatalFailure))
                .await;
            return Err(DeletionFailure::new(
                outcome,
                e.context(format!("failed to delete bucket '{bucket}'")),
            ));
        }
        info!(bucket = %bucket, "bucket has been deleted.");

        Ok(outcome)
    }

    /// Resolve the region, list the inventory under `prefix`, and delete it.
    async fn delete_listed(
        &self,
        bucket: &Bucket,
        prefix: Option<&str>,
    ) -> Result<(DeleteOutcome, Region), DeletionFailure> {
        let region = self.resolve_region(bucket).await?;

        self.enter_phase(DeletionPhase::Listing).await;
        let lister = ObjectLister::new(
            self.storage.clone(),
            self.cancellation_token.clone(),
            self.stats_sender.clone(),
            self.deletion_stats_report.clone(),
            self.config.max_keys,
        );
        let inventory = match lister.list_all(bucket, region, prefix).await {
            Ok(inventory) => inventory,
            Err(e) if is_cancelled_error(&e) => {
                return Err(self.finish_with_error(OutcomeStatus::Cancelled, e).await);
            }
            Err(e) => {
                error!(bucket = %bucket, error = format!("{e:#}"), "failed to list object versions.");
                return Err(self
                    .finish_with_error(
                        OutcomeStatus::FatalFailure,
                        e.context(format!("failed to list object versions in '{bucket}'")),
                    )
                    .await);
            }
        };

        info!(bucket = %bucket, objects = inventory.len(), "listing has been completed.");

        if inventory.is_empty() {
            self.enter_phase(DeletionPhase::Done(OutcomeStatus::Success))
                .await;
            return Ok((DeleteOutcome::default(), region));
        }

        let outcome = self.dispatch(bucket, region, &inventory).await?;
        Ok((outcome, region))
    }

    fn validate(&self, bucket: &str) -> Result<Bucket, DeletionFailure> {
        self.validate_region()?;
        Bucket::new(bucket).map_err(|e| {
            warn!(bucket = bucket, error = %e, "invalid bucket name.");
            DeletionFailure::new(DeleteOutcome::fatal(), S3cleanError::from(e))
        })
    }

    fn validate_region(&self) -> Result<(), DeletionFailure> {
        if let Some(region) = &self.config.region {
            region.parse::<Region>().map_err(|e| {
                warn!(region = region, error = %e, "invalid region.");
                DeletionFailure::new(DeleteOutcome::fatal(), S3cleanError::from(e))
            })?;
        }
        Ok(())
    }

    async fn resolve_region(&self, bucket: &Bucket) -> Result<Region, DeletionFailure> {
        self.enter_phase(DeletionPhase::ResolvingRegion).await;

        match self.storage.get_bucket_region(bucket).await {
            Ok(region) => {
                debug!(bucket = %bucket, region = %region, "bucket region resolved.");
                Ok(region)
            }
            Err(e) => {
                error!(bucket = %bucket, error = format!("{e:#}"), "failed to resolve bucket region.");
                Err(self
                    .finish_with_error(
                        OutcomeStatus::FatalFailure,
                        S3cleanError::Precondition(format!(
                            "failed to resolve the region of bucket '{bucket}': {e:#}"
                        )),
                    )
                    .await)
            }
        }
    }

    async fn dispatch(
        &self,
        bucket: &Bucket,
        region: Region,
        identifiers: &ObjectIdentifierSet,
    ) -> DeleteResult {
        self.enter_phase(DeletionPhase::Chunking).await;
        let batch_size = self.config.effective_batch_size();
        let chunk_count = identifiers.len().div_ceil(batch_size);
        let worker_size = (self.config.worker_size as usize).max(1);

        info!(
            bucket = %bucket,
            region = %region,
            objects = identifiers.len(),
            chunks = chunk_count,
            batch_size = batch_size,
            worker_size = worker_size,
            "starting bulk delete."
        );

        self.enter_phase(DeletionPhase::Dispatching).await;
        let semaphore = Arc::new(Semaphore::new(worker_size));
        let dispatch_token = self.cancellation_token.child_token();
        let mut join_set = JoinSet::new();
        let mut dispatched = 0;

        for (chunk_index, chunk) in identifiers.chunks(batch_size).enumerate() {
            let permit = tokio::select! {
                biased;
                _ = dispatch_token.cancelled() => {
                    info!(chunk_index = chunk_index, "chunk dispatch has been stopped.");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(error = %e, "worker semaphore closed.");
                        break;
                    }
                }
            };

            let chunk_deleter = ChunkDeleter {
                chunk_index,
                bucket: bucket.clone(),
                region,
                storage: self.storage.clone(),
                retry_policy: self.retry_policy.clone(),
                cancellation_token: dispatch_token.clone(),
                abort_on_failure: self.config.abort_on_failure,
                stats_sender: self.stats_sender.clone(),
                stats_report: self.deletion_stats_report.clone(),
            };

            // Double spawn so a panicking chunk is reported with its index.
            join_set.spawn(async move {
                let _permit = permit;
                tokio::spawn(chunk_deleter.delete(chunk))
                    .await
                    .map_err(|e| (chunk_index, e))
            });
            dispatched += 1;
        }

        if dispatched < chunk_count {
            warn!(
                dispatched = dispatched,
                not_dispatched = chunk_count - dispatched,
                "some chunks were not dispatched."
            );
        }

        self.enter_phase(DeletionPhase::Aggregating).await;
        let mut outcome = DeleteOutcome::default();
        let mut task_errors = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(ChunkResult { deleted, failed })) => {
                    outcome.deleted_count += deleted;
                    outcome.failed.extend(failed);
                }
                Ok(Err((chunk_index, e))) => {
                    error!(chunk_index = chunk_index, error = %e, "chunk task panicked.");
                    self.fail_lost_chunk(identifiers, chunk_index, batch_size, &mut outcome);
                    task_errors.push(format!("chunk {chunk_index} task failed: {e}"));
                }
                Err(e) => {
                    error!(error = %e, "chunk supervisor task failed.");
                    task_errors.push(format!("chunk supervisor task failed: {e}"));
                }
            }
        }

        let cancelled = self.cancellation_token.is_cancelled();
        outcome.status = if cancelled {
            OutcomeStatus::Cancelled
        } else if outcome.failed.is_empty() && task_errors.is_empty() && dispatched == chunk_count
        {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::PartialFailure
        };

        self.enter_phase(DeletionPhase::Done(outcome.status)).await;
        info!(
            bucket = %bucket,
            deleted = outcome.deleted_count,
            failed = outcome.failed.len(),
            status = ?outcome.status,
            "bulk delete has been completed."
        );

        let error = match outcome.status {
            OutcomeStatus::Success => return Ok(outcome),
            OutcomeStatus::Cancelled => S3cleanError::Cancelled,
            _ if !task_errors.is_empty() => S3cleanError::Pipeline(task_errors.join("; ")),
            _ => S3cleanError::PartialFailure {
                deleted: outcome.deleted_count,
                failed: outcome.failed_count(),
            },
        };
        Err(DeletionFailure::new(outcome, error))
    }

    /// Record every identifier of a chunk whose task panicked as failed.
    fn fail_lost_chunk(
        &self,
        identifiers: &ObjectIdentifierSet,
        chunk_index: usize,
        batch_size: usize,
        outcome: &mut DeleteOutcome,
    ) {
        let all = identifiers.as_slice();
        let start = (chunk_index * batch_size).min(all.len());
        let end = (start + batch_size).min(all.len());
        let lost = &all[start..end];

        self.deletion_stats_report.increment_failed(lost.len() as u64);
        outcome
            .failed
            .extend(lost.iter().map(|identifier| FailedIdentifier {
                identifier: identifier.clone(),
                error_code: "TaskPanicked".to_string(),
                error_message: "chunk task panicked; outcome unknown".to_string(),
            }));
    }

    async fn finish_with_error(
        &self,
        status: OutcomeStatus,
        error: impl Into<anyhow::Error>,
    ) -> DeletionFailure {
        self.enter_phase(DeletionPhase::Done(status)).await;
        DeletionFailure::new(
            DeleteOutcome {
                status,
                ..DeleteOutcome::default()
            },
            error,
        )
    }

    /// Start a public call: counters only ever describe the current call.
    async fn begin_call(&self) {
        self.deletion_stats_report.reset();
        self.enter_phase(DeletionPhase::Idle).await;
    }

    async fn enter_phase(&self, phase: DeletionPhase) {
        debug!(phase = ?phase, "deletion phase changed.");
        let _ = self
            .stats_sender
            .send(DeletionStatistics::PhaseChanged(phase))
            .await;
    }
}
