//! Per-chunk deletion using the store's batch delete call.
//!
//! One [`ChunkDeleter`] runs inside each dispatched chunk task. It issues the
//! batch request, records per-key outcomes, and retries transient failures
//! according to the retry policy. Only the identifiers still pending are sent
//! again on a retry.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use async_channel::Sender;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::storage::{BatchDeleteError, BatchDeleteOutput, Storage};
use crate::types::error::{DeletionError, S3cleanError};
use crate::types::token::DeletionCancellationToken;
use crate::types::{
    DeletionStatistics, DeletionStatsReport, FailedIdentifier, ObjectIdentifier,
    ObjectIdentifierSet,
};
use crate::validation::{Bucket, Region};

/// Maximum objects per batch DeleteObjects API call (S3 limit).
pub const MAX_BATCH_SIZE: usize = 1000;

/// What one chunk task reports back to the dispatcher.
#[derive(Debug, Default)]
pub(crate) struct ChunkResult {
    pub deleted: u64,
    pub failed: Vec<FailedIdentifier>,
}

/// Why the identifiers still pending after an attempt were not deleted.
enum PendingCause {
    /// The whole request failed.
    Request(Error),
    /// The request succeeded but the store refused these keys.
    Keys(Vec<BatchDeleteError>),
}

pub(crate) struct ChunkDeleter {
    pub chunk_index: usize,
    pub bucket: Bucket,
    pub region: Region,
    pub storage: Storage,
    pub retry_policy: Arc<dyn RetryPolicy>,
    /// Dispatch token: cancelled by the caller or on abort-on-failure.
    pub cancellation_token: DeletionCancellationToken,
    pub abort_on_failure: bool,
    pub stats_sender: Sender<DeletionStatistics>,
    pub stats_report: Arc<DeletionStatsReport>,
}

impl ChunkDeleter {
    pub async fn delete(self, chunk: ObjectIdentifierSet) -> ChunkResult {
        let mut result = ChunkResult::default();
        let mut pending = chunk.into_vec();
        let mut attempt: u32 = 1;

        debug!(
            chunk_index = self.chunk_index,
            object_count = pending.len(),
            "sending batch delete request."
        );

        loop {
            let cause = match self
                .storage
                .delete_object_batch(&self.bucket, self.region, &pending)
                .await
            {
                Ok(output) => {
                    let retryable = self.absorb_output(output, &pending, &mut result).await;
                    if retryable.is_empty() {
                        break;
                    }
                    PendingCause::Keys(retryable)
                }
                Err(e) => PendingCause::Request(e),
            };

            let key_error;
            let decision_err: &Error = match &cause {
                PendingCause::Request(e) => e,
                PendingCause::Keys(errors) => {
                    key_error = anyhow!(errors[0].classify());
                    &key_error
                }
            };

            let decision = match self.retry_policy.decide(decision_err, attempt) {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        chunk_index = self.chunk_index,
                        attempt = attempt,
                        error = format!("{e:#}"),
                        "failed to compute retry delay; giving up on the chunk."
                    );
                    self.fail_all(&pending, &e, &mut result).await;
                    break;
                }
            };

            if !decision.should_retry {
                warn!(
                    chunk_index = self.chunk_index,
                    attempt = attempt,
                    max_attempts = self.retry_policy.max_attempts(),
                    pending = pending.len(),
                    error = format!("{decision_err:#}"),
                    "batch delete failed permanently."
                );
                match cause {
                    PendingCause::Request(e) => self.fail_all(&pending, &e, &mut result).await,
                    PendingCause::Keys(errors) => {
                        for error in errors {
                            self.fail_key(error, &mut result).await;
                        }
                    }
                }
                break;
            }

            warn!(
                chunk_index = self.chunk_index,
                attempt = attempt,
                delay_secs = decision.delay.as_secs(),
                error = format!("{decision_err:#}"),
                "batch delete failed; retrying after delay."
            );

            if let PendingCause::Keys(errors) = cause {
                pending = errors.into_iter().map(|e| e.identifier).collect();
            }
            self.stats_report.increment_retried();
            self.send_stats(DeletionStatistics::DeleteRetry {
                chunk_index: self.chunk_index,
                attempt,
            })
            .await;

            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    debug!(chunk_index = self.chunk_index, "retry cancelled.");
                    self.fail_all(&pending, &anyhow!(S3cleanError::Cancelled), &mut result).await;
                    break;
                }
                _ = tokio::time::sleep(decision.delay) => {}
            }

            attempt += 1;
        }

        if self.abort_on_failure && !result.failed.is_empty() {
            warn!(
                chunk_index = self.chunk_index,
                "chunk failed; stopping further dispatch."
            );
            self.cancellation_token.cancel();
        }

        self.stats_report.increment_chunks_completed();
        self.send_stats(DeletionStatistics::ChunkComplete {
            chunk_index: self.chunk_index,
            deleted: result.deleted,
            failed: result.failed.len() as u64,
        })
        .await;

        debug!(
            chunk_index = self.chunk_index,
            deleted = result.deleted,
            failed = result.failed.len(),
            attempts = attempt,
            "chunk has been completed."
        );

        result
    }

    /// Count everything the store did not refuse as deleted, fail the
    /// permanent refusals, and return the refusals worth retrying.
    async fn absorb_output(
        &self,
        output: BatchDeleteOutput,
        requested: &[ObjectIdentifier],
        result: &mut ChunkResult,
    ) -> Vec<BatchDeleteError> {
        let refused: HashSet<&ObjectIdentifier> =
            output.errors.iter().map(|e| &e.identifier).collect();

        let mut deleted_now = 0;
        for identifier in requested.iter().filter(|i| !refused.contains(i)) {
            deleted_now += 1;
            self.send_stats(DeletionStatistics::DeleteComplete {
                key: identifier.key.clone(),
                version_id: identifier.version_id.clone(),
            })
            .await;
        }
        result.deleted += deleted_now;
        self.stats_report.increment_deleted(deleted_now);

        let mut retryable = Vec::new();
        for error in output.errors {
            if self.retry_policy.is_retryable(&anyhow!(error.classify())) {
                retryable.push(error);
            } else {
                warn!(
                    chunk_index = self.chunk_index,
                    key = error.identifier.key,
                    version_id = error.identifier.version_id,
                    s3_error_code = error.code,
                    s3_error_message = error.message,
                    "batch delete partial failure for key '{}': {} ({}).",
                    error.identifier.key,
                    error.code,
                    error.message,
                );
                self.fail_key(error, result).await;
            }
        }

        retryable
    }

    async fn fail_key(&self, error: BatchDeleteError, result: &mut ChunkResult) {
        self.record_failure(
            FailedIdentifier {
                identifier: error.identifier,
                error_code: error.code,
                error_message: error.message,
            },
            result,
        )
        .await;
    }

    async fn fail_all(&self, identifiers: &[ObjectIdentifier], cause: &Error, result: &mut ChunkResult) {
        let error_code = failure_code(cause);
        let error_message = format!("{cause:#}");
        for identifier in identifiers {
            self.record_failure(
                FailedIdentifier {
                    identifier: identifier.clone(),
                    error_code: error_code.clone(),
                    error_message: error_message.clone(),
                },
                result,
            )
            .await;
        }
    }

    async fn record_failure(&self, failed: FailedIdentifier, result: &mut ChunkResult) {
        self.stats_report.increment_failed(1);
        self.send_stats(DeletionStatistics::DeleteError {
            key: failed.identifier.key.clone(),
            version_id: failed.identifier.version_id.clone(),
        })
        .await;
        result.failed.push(failed);
    }

    async fn send_stats(&self, stats: DeletionStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

/// Error code recorded for identifiers failed by a whole-request error.
pub(crate) fn failure_code(e: &Error) -> String {
    if let Some(err) = e.downcast_ref::<DeletionError>() {
        return err.error_code().to_string();
    }
    match e.downcast_ref::<S3cleanError>() {
        Some(S3cleanError::Cancelled) => "Cancelled".to_string(),
        _ => "N/A".to_string(),
    }
}
