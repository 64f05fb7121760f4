use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::ClientConfig;
use crate::types::ObjectIdentifier;
use crate::types::error::DeletionError;
use crate::validation::{Bucket, Region};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Position to resume a version listing from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationToken {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// One page of a version listing: object versions followed by delete markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectVersionPage {
    pub identifiers: Vec<ObjectIdentifier>,
    /// `None` once the listing is complete.
    pub next: Option<ContinuationToken>,
}

/// A single key the store refused to delete inside an otherwise accepted
/// batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDeleteError {
    pub identifier: ObjectIdentifier,
    pub code: String,
    pub message: String,
}

impl BatchDeleteError {
    pub fn classify(&self) -> DeletionError {
        DeletionError::from_error_code(&self.code, &self.message)
    }
}

/// Per-key result of one batch delete request.
///
/// Identifiers that appear in neither list are treated as deleted by the
/// caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDeleteOutput {
    pub deleted: Vec<ObjectIdentifier>,
    pub errors: Vec<BatchDeleteError>,
}

/// Object store capability used by the bulk deleter.
///
/// Calls are stateless with respect to the bucket: every method receives the
/// bucket (and, after resolution, its region), so one handle can serve any
/// number of targets and be shared by all concurrent chunk tasks.
///
/// Errors should carry a [`DeletionError`] (via `anyhow`) so the retry
/// policy can classify them; anything else is treated as permanent.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Look up the region a bucket lives in.
    async fn get_bucket_region(&self, bucket: &Bucket) -> Result<Region>;

    /// Fetch one page of object versions and delete markers.
    async fn list_object_versions(
        &self,
        bucket: &Bucket,
        region: Region,
        prefix: Option<&str>,
        continuation: Option<ContinuationToken>,
        max_keys: i32,
    ) -> Result<ObjectVersionPage>;

    /// Delete up to `MAX_BATCH_SIZE` identifiers in one request.
    ///
    /// An `Err` means the whole request failed; per-key refusals are reported
    /// in [`BatchDeleteOutput::errors`].
    async fn delete_object_batch(
        &self,
        bucket: &Bucket,
        region: Region,
        identifiers: &[ObjectIdentifier],
    ) -> Result<BatchDeleteOutput>;

    /// Delete an (empty) bucket.
    async fn delete_bucket(&self, bucket: &Bucket, region: Region) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the S3-backed storage from a client configuration.
pub async fn create_storage(client_config: &ClientConfig) -> Storage {
    let client = client_config.create_client().await;
    Box::new(s3::S3Storage::new(
        client,
        client_config.request_payer.clone(),
    ))
}
