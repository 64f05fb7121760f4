pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::types::{Delete, RequestPayer};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::sync::Arc;

use crate::storage::{
    BatchDeleteError, BatchDeleteOutput, ContinuationToken, ObjectVersionPage, StorageTrait,
};
use crate::types::ObjectIdentifier;
use crate::types::error::{DeletionError, S3cleanError};
use crate::validation::{Bucket, Region};

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors, returns the S3 error code (e.g. "AccessDenied") and
/// the message from the response. For other error types (network, timeout,
/// construction failure), returns "N/A" and the full error description.
fn extract_sdk_error_details<E>(e: &SdkError<E, HttpResponse>) -> (String, String)
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
{
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), DisplayErrorContext(e).to_string())
    }
}

/// Map an AWS SDK error onto the retry classification.
///
/// Transport failures are network errors. Service errors are classified by
/// their S3 error code, falling back to the HTTP status (429 and 5xx are
/// transient).
pub(crate) fn classify_sdk_error<E>(e: &SdkError<E, HttpResponse>) -> DeletionError
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
{
    let (code, message) = extract_sdk_error_details(e);
    match e {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            DeletionError::NetworkError(message)
        }
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            match DeletionError::from_error_code(&code, &message) {
                DeletionError::Other { .. } if status == 429 => DeletionError::Throttled(message),
                DeletionError::Other { .. } if status >= 500 => {
                    DeletionError::ServiceError(message)
                }
                DeletionError::Other { .. } if status == 403 => {
                    DeletionError::AccessDenied(message)
                }
                DeletionError::Other { .. } if status == 404 => DeletionError::NotFound(message),
                classified => classified,
            }
        }
        _ => DeletionError::Other { code, message },
    }
}

/// `aws-sdk-s3` implementation of [`StorageTrait`].
///
/// Every request is routed to the region passed in by the caller through a
/// per-operation config override, so one client serves buckets in any
/// region.
#[derive(Clone)]
pub struct S3Storage {
    client: Arc<Client>,
    request_payer: Option<RequestPayer>,
}

impl S3Storage {
    pub fn new(client: Client, request_payer: Option<RequestPayer>) -> Self {
        Self {
            client: Arc::new(client),
            request_payer,
        }
    }

    fn region_override(region: Region) -> aws_sdk_s3::config::Builder {
        aws_sdk_s3::config::Builder::default()
            .region(aws_sdk_s3::config::Region::new(region.as_str()))
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn get_bucket_region(&self, bucket: &Bucket) -> Result<Region> {
        let output = self
            .client
            .get_bucket_location()
            .bucket(bucket.as_str())
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = %bucket,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 GetBucketLocation API call failed for bucket '{}': {} ({}).",
                    bucket,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(classify_sdk_error(&e))
                    .context("aws_sdk_s3::client::get_bucket_location() failed.")
            })?;

        let constraint = output.location_constraint().map(|c| c.as_str());
        let region = Region::from_location_constraint(constraint).map_err(S3cleanError::from)?;

        tracing::debug!(bucket = %bucket, region = %region, "Resolved bucket region.");
        Ok(region)
    }

    async fn list_object_versions(
        &self,
        bucket: &Bucket,
        region: Region,
        prefix: Option<&str>,
        continuation: Option<ContinuationToken>,
        max_keys: i32,
    ) -> Result<ObjectVersionPage> {
        let continuation = continuation.unwrap_or_default();

        let output = self
            .client
            .list_object_versions()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket.as_str())
            .set_prefix(prefix.map(String::from))
            .set_key_marker(continuation.key_marker)
            .set_version_id_marker(continuation.version_id_marker)
            .max_keys(max_keys)
            .customize()
            .config_override(Self::region_override(region))
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = %bucket,
                    region = %region,
                    prefix = prefix,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 ListObjectVersions API call failed for s3://{}/{}: {} ({}).",
                    bucket,
                    prefix.unwrap_or_default(),
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(classify_sdk_error(&e))
                    .context("aws_sdk_s3::client::list_object_versions() failed.")
            })?;

        let versions = output.versions().iter().filter_map(|version| {
            version.key().map(|key| ObjectIdentifier {
                key: key.to_string(),
                version_id: version.version_id().map(String::from),
            })
        });
        let delete_markers = output.delete_markers().iter().filter_map(|marker| {
            marker.key().map(|key| ObjectIdentifier {
                key: key.to_string(),
                version_id: marker.version_id().map(String::from),
            })
        });
        let identifiers = versions.chain(delete_markers).collect();

        let next = if output.is_truncated() == Some(true) {
            Some(ContinuationToken {
                key_marker: output.next_key_marker().map(String::from),
                version_id_marker: output.next_version_id_marker().map(String::from),
            })
        } else {
            None
        };

        Ok(ObjectVersionPage { identifiers, next })
    }

    async fn delete_object_batch(
        &self,
        bucket: &Bucket,
        region: Region,
        identifiers: &[ObjectIdentifier],
    ) -> Result<BatchDeleteOutput> {
        let object_count = identifiers.len();

        let objects = identifiers
            .iter()
            .map(|identifier| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(&identifier.key)
                    .set_version_id(identifier.version_id.clone())
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to build ObjectIdentifier")?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .context("Failed to build Delete request")?;

        let output = self
            .client
            .delete_objects()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket.as_str())
            .delete(delete)
            .customize()
            .config_override(Self::region_override(region))
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::warn!(
                    bucket = %bucket,
                    region = %region,
                    object_count = object_count,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteObjects API call failed for {} objects in s3://{}: {} ({}).",
                    object_count,
                    bucket,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(classify_sdk_error(&e))
                    .context("aws_sdk_s3::client::delete_objects() failed.")
            })?;

        let deleted = output
            .deleted()
            .iter()
            .filter_map(|deleted| {
                deleted.key().map(|key| ObjectIdentifier {
                    key: key.to_string(),
                    version_id: deleted.version_id().map(String::from),
                })
            })
            .collect();

        let errors = output
            .errors()
            .iter()
            .map(|error| BatchDeleteError {
                identifier: ObjectIdentifier {
                    key: error.key().unwrap_or_default().to_string(),
                    version_id: error.version_id().map(String::from),
                },
                code: error.code().unwrap_or("unknown").to_string(),
                message: error.message().unwrap_or("no message").to_string(),
            })
            .collect();

        Ok(BatchDeleteOutput { deleted, errors })
    }

    async fn delete_bucket(&self, bucket: &Bucket, region: Region) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket.as_str())
            .customize()
            .config_override(Self::region_override(region))
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = %bucket,
                    region = %region,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteBucket API call failed for bucket '{}': {} ({}).",
                    bucket,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(classify_sdk_error(&e)).context("aws_sdk_s3::client::delete_bucket() failed.")
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::delete_objects::DeleteObjectsError;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use aws_smithy_types::error::ErrorMetadata;

    fn service_error(code: Option<&str>, status: u16) -> SdkError<DeleteObjectsError, HttpResponse> {
        let mut meta = ErrorMetadata::builder().message("boom");
        if let Some(code) = code {
            meta = meta.code(code);
        }
        let raw = HttpResponse::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from("<Error/>"),
        );
        SdkError::service_error(DeleteObjectsError::generic(meta.build()), raw)
    }

    #[test]
    fn classify_by_error_code() {
        assert_eq!(
            classify_sdk_error(&service_error(Some("SlowDown"), 503)),
            DeletionError::Throttled("boom".to_string())
        );
        assert_eq!(
            classify_sdk_error(&service_error(Some("AccessDenied"), 403)),
            DeletionError::AccessDenied("boom".to_string())
        );
    }

    #[test]
    fn classify_falls_back_to_http_status() {
        assert_eq!(
            classify_sdk_error(&service_error(Some("Mystery"), 502)),
            DeletionError::ServiceError("boom".to_string())
        );
        assert_eq!(
            classify_sdk_error(&service_error(None, 429)),
            DeletionError::Throttled("boom".to_string())
        );
        assert_eq!(
            classify_sdk_error(&service_error(None, 404)),
            DeletionError::NotFound("boom".to_string())
        );
        assert!(matches!(
            classify_sdk_error(&service_error(Some("InvalidArgument"), 400)),
            DeletionError::Other { .. }
        ));
    }

    #[test]
    fn classify_transport_failures_as_network_errors() {
        let err: SdkError<DeleteObjectsError, HttpResponse> =
            SdkError::timeout_error("operation timed out");
        assert!(matches!(
            classify_sdk_error(&err),
            DeletionError::NetworkError(_)
        ));
    }

    #[test]
    fn construction_failures_are_permanent() {
        let err: SdkError<DeleteObjectsError, HttpResponse> =
            SdkError::construction_failure("bad input");
        let classified = classify_sdk_error(&err);
        assert!(!classified.is_retryable());
        assert_eq!(classified.error_code(), "N/A");
    }
}
