use std::time::Duration;

use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::{BehaviorVersion, ConfigLoader};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3clean";

impl ClientConfig {
    /// Build an S3 client from this configuration.
    ///
    /// The region set here only picks the endpoint for the bucket location
    /// lookup; every bucket-scoped call is routed to the bucket's own region.
    pub async fn create_client(&self) -> Client {
        let sdk_config = self.load_sdk_config().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .accelerate(self.accelerate)
            .request_checksum_calculation(self.request_checksum_calculation)
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        if self.disable_stalled_stream_protection {
            builder = builder.stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        }

        Client::from_conf(builder.build())
    }

    async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(profile_files) = self.build_profile_files() {
            loader = loader.profile_files(profile_files);
        }

        loader = match &self.credential {
            S3Credentials::Profile(profile_name) => loader.profile_name(profile_name),
            S3Credentials::Credentials { access_keys } => {
                loader.credentials_provider(Credentials::new(
                    access_keys.access_key.clone(),
                    access_keys.secret_access_key.clone(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ))
            }
            S3Credentials::FromEnvironment => loader,
        };

        loader = self.apply_region(loader).await;

        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }

    async fn apply_region(&self, loader: ConfigLoader) -> ConfigLoader {
        let provider = RegionProviderChain::first_try(
            self.region.clone().map(aws_config::Region::new),
        )
        .or_default_provider();

        match provider.region().await {
            Some(region) => loader.region(region),
            None => {
                tracing::debug!("No region configured; falling back to us-east-1.");
                loader.region(aws_config::Region::new("us-east-1"))
            }
        }
    }

    fn build_profile_files(&self) -> Option<ProfileFiles> {
        let location = &self.client_config_location;
        if location.aws_config_file.is_none() && location.aws_shared_credentials_file.is_none() {
            return None;
        }

        let mut builder = ProfileFiles::builder()
            .include_default_config_file(location.aws_config_file.is_none())
            .include_default_credentials_file(location.aws_shared_credentials_file.is_none());

        if let Some(path) = &location.aws_config_file {
            builder = builder.with_file(ProfileFileKind::Config, path);
        }
        if let Some(path) = &location.aws_shared_credentials_file {
            builder = builder.with_file(ProfileFileKind::Credentials, path);
        }

        Some(builder.build())
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts.max(1))
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();
        builder.set_operation_timeout(timeouts.operation_timeout_milliseconds.map(Duration::from_millis));
        builder.set_operation_attempt_timeout(
            timeouts
                .operation_attempt_timeout_milliseconds
                .map(Duration::from_millis),
        );
        builder.set_connect_timeout(timeouts.connect_timeout_milliseconds.map(Duration::from_millis));
        builder.set_read_timeout(timeouts.read_timeout_milliseconds.map(Duration::from_millis));
        builder.build()
    }
}
