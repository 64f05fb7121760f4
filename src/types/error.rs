use anyhow::Error;
use thiserror::Error;

use crate::types::DeleteOutcome;
use crate::validation::ValidationError;

/// Application-level errors for s3clean-rs.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Cancelled
/// - 1: General errors (Precondition, Pipeline)
/// - 2: Validation and configuration errors
/// - 3: Partial failure (some objects deleted, some failed)
#[derive(Error, Debug, PartialEq)]
pub enum S3cleanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The call could not start, e.g. the bucket region lookup failed.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Partial failure: {deleted} deleted, {failed} failed")]
    PartialFailure { deleted: u64, failed: u64 },

    /// A chunk task panicked or was aborted.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl S3cleanError {
    pub fn exit_code(&self) -> i32 {
        match self {
            S3cleanError::Cancelled => 0,
            S3cleanError::Validation(_) => 2,
            S3cleanError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }
}

/// Classification of an error returned by the object store.
///
/// `Throttled`, `ServiceError` and `NetworkError` are transient; the rest are
/// permanent and fail the affected identifiers immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeletionError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("service error: {0}")]
    ServiceError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl DeletionError {
    /// Classify an S3 error code as reported by the service.
    pub fn from_error_code(code: &str, message: &str) -> Self {
        let message = message.to_string();
        match code {
            "SlowDown" | "Throttling" | "ThrottlingException" | "RequestLimitExceeded"
            | "TooManyRequests" | "RequestThrottled" => DeletionError::Throttled(message),
            "InternalError" | "ServiceUnavailable" | "503" | "500" => {
                DeletionError::ServiceError(message)
            }
            "RequestTimeout" | "RequestTimeTooSkewed" => DeletionError::NetworkError(message),
            "NoSuchBucket" | "NoSuchKey" | "NoSuchVersion" | "NotFound" => {
                DeletionError::NotFound(message)
            }
            "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch" | "AccountProblem" => DeletionError::AccessDenied(message),
            "PreconditionFailed" | "BucketNotEmpty" | "InvalidBucketState" => {
                DeletionError::PreconditionFailed(message)
            }
            other => DeletionError::Other {
                code: other.to_string(),
                message,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeletionError::Throttled(_)
                | DeletionError::ServiceError(_)
                | DeletionError::NetworkError(_)
        )
    }

    /// Short code used for `FailedIdentifier::error_code` and log fields.
    pub fn error_code(&self) -> &str {
        match self {
            DeletionError::Throttled(_) => "Throttled",
            DeletionError::ServiceError(_) => "ServiceError",
            DeletionError::NetworkError(_) => "NetworkError",
            DeletionError::NotFound(_) => "NotFound",
            DeletionError::AccessDenied(_) => "AccessDenied",
            DeletionError::PreconditionFailed(_) => "PreconditionFailed",
            DeletionError::Other { code, .. } => code,
        }
    }
}

/// Error half of a bulk delete call: the cause plus the partial outcome
/// accumulated before it happened.
#[derive(Error, Debug)]
#[error("{error:#}")]
pub struct DeletionFailure {
    pub outcome: DeleteOutcome,
    pub error: Error,
}

impl DeletionFailure {
    pub fn new(outcome: DeleteOutcome, error: impl Into<Error>) -> Self {
        Self {
            outcome,
            error: error.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        exit_code_from_error(&self.error)
    }

    pub fn is_cancelled(&self) -> bool {
        is_cancelled_error(&self.error)
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3cleanError>() {
        return *err == S3cleanError::Cancelled;
    }
    if let Some(failure) = e.downcast_ref::<DeletionFailure>() {
        return failure.is_cancelled();
    }
    false
}

/// Check if an anyhow::Error wraps a validation error.
pub fn is_validation_error(e: &Error) -> bool {
    if e.downcast_ref::<ValidationError>().is_some() {
        return true;
    }
    matches!(
        e.downcast_ref::<S3cleanError>(),
        Some(S3cleanError::Validation(_))
    )
}

/// Whether an error returned by the store is worth retrying.
///
/// Errors that are not a [`DeletionError`] are treated as permanent.
pub fn is_retryable_error(e: &Error) -> bool {
    e.downcast_ref::<DeletionError>()
        .is_some_and(DeletionError::is_retryable)
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3cleanError>() {
        return err.exit_code();
    }
    if let Some(failure) = e.downcast_ref::<DeletionFailure>() {
        return failure.exit_code();
    }
    if e.downcast_ref::<ValidationError>().is_some() {
        return 2;
    }
    1
}
