use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use tracing::{debug, info};

use crate::storage::Storage;
use crate::types::error::S3cleanError;
use crate::types::token::DeletionCancellationToken;
use crate::types::{DeletionStatistics, DeletionStatsReport, ObjectIdentifierSet};
use crate::validation::{Bucket, Region};

/// Collects the full version inventory of a bucket (or a prefix of it).
///
/// Pages through `StorageTrait::list_object_versions` until the store stops
/// returning a continuation, checking the cancellation token before each
/// page. Object versions and delete markers both end up in the inventory.
pub struct ObjectLister {
    storage: Storage,
    cancellation_token: DeletionCancellationToken,
    stats_sender: Sender<DeletionStatistics>,
    stats_report: Arc<DeletionStatsReport>,
    max_keys: i32,
}

impl ObjectLister {
    pub fn new(
        storage: Storage,
        cancellation_token: DeletionCancellationToken,
        stats_sender: Sender<DeletionStatistics>,
        stats_report: Arc<DeletionStatsReport>,
        max_keys: i32,
    ) -> Self {
        Self {
            storage,
            cancellation_token,
            stats_sender,
            stats_report,
            max_keys,
        }
    }

    /// List every version and delete marker under `prefix`.
    ///
    /// Returns `S3cleanError::Cancelled` if the token fires between pages;
    /// the partial inventory is discarded.
    pub async fn list_all(
        &self,
        bucket: &Bucket,
        region: Region,
        prefix: Option<&str>,
    ) -> Result<ObjectIdentifierSet> {
        debug!(bucket = %bucket, region = %region, prefix = prefix, "version listing has started.");

        let mut inventory = ObjectIdentifierSet::new();
        let mut continuation = None;
        let mut pages: u64 = 0;

        loop {
            if self.cancellation_token.is_cancelled() {
                info!(bucket = %bucket, pages = pages, "Version listing cancelled.");
                return Err(anyhow!(S3cleanError::Cancelled));
            }

            let page = self
                .storage
                .list_object_versions(bucket, region, prefix, continuation.take(), self.max_keys)
                .await?;
            pages += 1;

            let listed = page.identifiers.len() as u64;
            for identifier in page.identifiers {
                inventory.add(identifier).map_err(S3cleanError::from)?;
            }

            self.stats_report.increment_listed(listed);
            let _ = self
                .stats_sender
                .send(DeletionStatistics::ObjectsListed(listed))
                .await;

            match page.next {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        debug!(
            bucket = %bucket,
            pages = pages,
            objects = inventory.len(),
            "version listing has been completed."
        );
        Ok(inventory)
    }
}
