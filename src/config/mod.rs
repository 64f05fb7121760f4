pub mod args;

use crate::deleter::batch::MAX_BATCH_SIZE;
use crate::retry::RetryPolicyConfig;
use crate::types::{BucketTarget, ClientConfigLocation, S3Credentials};
use crate::validation::{Bucket, ValidationError};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;

pub const DEFAULT_WORKER_SIZE: u16 = 16;
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Main configuration for a bulk delete run.
///
/// Holds the targets, the S3 client settings, the worker ceiling, the batch
/// size and the retry policy settings used by a
/// [`BulkDeleter`](crate::BulkDeleter).
///
/// # Quick Start
///
/// ```
/// use s3clean_rs::Config;
///
/// let config = Config::for_bucket("my-bucket").unwrap();
/// assert_eq!(config.worker_size, 16);
/// assert_eq!(config.batch_size, 1000);
/// ```
///
/// Then customize fields as needed:
///
/// ```
/// use s3clean_rs::Config;
///
/// let mut config = Config::for_bucket("my-bucket").unwrap();
/// config.worker_size = 4;
/// config.abort_on_failure = true;
/// config.retry_policy_config.max_attempts = 5;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<BucketTarget>,
    pub keep_bucket: bool,
    pub show_no_progress: bool,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    /// Region code every call is checked against before any store call.
    pub region: Option<String>,
    pub worker_size: u16,
    pub batch_size: u16,
    pub max_keys: i32,
    pub retry_policy_config: RetryPolicyConfig,
    pub abort_on_failure: bool,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with defaults for a single whole-bucket target.
    pub fn for_bucket(bucket: &str) -> Result<Self, ValidationError> {
        Ok(Config {
            targets: vec![BucketTarget::new(Bucket::new(bucket)?, None)],
            ..Config::default()
        })
    }

    /// Batch size clamped to the store's batch-delete limit.
    pub fn effective_batch_size(&self) -> usize {
        (self.batch_size as usize).clamp(1, MAX_BATCH_SIZE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            targets: Vec::new(),
            keep_bucket: false,
            show_no_progress: false,
            target_client_config: None,
            tracing_config: None,
            region: None,
            worker_size: DEFAULT_WORKER_SIZE,
            batch_size: MAX_BATCH_SIZE as u16,
            max_keys: DEFAULT_MAX_KEYS,
            retry_policy_config: RetryPolicyConfig::default(),
            abort_on_failure: false,
            auto_complete_shell: None,
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub accelerate: bool,
    pub request_payer: Option<RequestPayer>,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
}

/// Retry settings handed to the AWS SDK (exponential backoff).
///
/// These apply to every SDK call, underneath the jittered chunk-level
/// retries of the bulk deleter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_dummy_tracing_subscriber;

    #[test]
    fn config_for_bucket_sets_single_target() {
        init_dummy_tracing_subscriber();

        let config = Config::for_bucket("my-bucket").unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].bucket.as_str(), "my-bucket");
        assert!(config.targets[0].key.is_none());
    }

    #[test]
    fn config_for_bucket_rejects_invalid_name() {
        assert!(matches!(
            Config::for_bucket("ab"),
            Err(ValidationError::BucketNameLength { .. })
        ));
    }

    #[test]
    fn config_default_field_values() {
        let config = Config::default();
        assert!(config.targets.is_empty());
        assert_eq!(config.worker_size, 16);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_keys, 1000);
        assert_eq!(config.retry_policy_config.max_attempts, 3);
        assert_eq!(config.retry_policy_config.max_delay_secs, 5);
        assert!(!config.keep_bucket);
        assert!(!config.abort_on_failure);
        assert!(!config.show_no_progress);
        assert!(config.region.is_none());
        assert!(config.tracing_config.is_none());
        assert!(config.target_client_config.is_none());
        assert!(config.auto_complete_shell.is_none());
    }

    #[test]
    fn effective_batch_size_is_clamped() {
        let mut config = Config::default();
        config.batch_size = 0;
        assert_eq!(config.effective_batch_size(), 1);
        config.batch_size = 5000;
        assert_eq!(config.effective_batch_size(), MAX_BATCH_SIZE);
        config.batch_size = 250;
        assert_eq!(config.effective_batch_size(), 250);
    }
}
