//! In-memory object store shared by the integration tests.
//!
//! Buckets hold versioned identifiers in insertion order. Individual keys can
//! be made to refuse deletion, permanently or for a number of attempts, the
//! way S3 reports per-key errors inside an accepted `DeleteObjects` request.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use s3clean_rs::storage::{BatchDeleteError, BatchDeleteOutput, ContinuationToken, ObjectVersionPage};
use s3clean_rs::{
    Bucket, DeletionError, ObjectIdentifier, Region, RetryPolicy, StorageTrait,
    types::error::is_retryable_error,
};

struct BucketState {
    region: Region,
    objects: Vec<ObjectIdentifier>,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BucketState>,
    refused_keys: HashMap<String, String>,
    throttled_keys: HashMap<String, u32>,
    batch_calls: usize,
    list_calls: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&self, bucket: &str, region: Region) {
        self.state.lock().unwrap().buckets.insert(
            bucket.to_string(),
            BucketState {
                region,
                objects: Vec::new(),
            },
        );
    }

    pub fn put_object(&self, bucket: &str, key: &str) {
        self.push(bucket, ObjectIdentifier::new(key));
    }

    /// Add `versions` versions of `key`, plus a delete marker on top.
    pub fn put_versioned_object(&self, bucket: &str, key: &str, versions: usize) {
        for v in 0..versions {
            self.push(bucket, ObjectIdentifier::with_version(key, format!("v{v}")));
        }
        self.push(bucket, ObjectIdentifier::with_version(key, "delete-marker"));
    }

    fn push(&self, bucket: &str, identifier: ObjectIdentifier) {
        let mut state = self.state.lock().unwrap();
        let bucket_state = state.buckets.get_mut(bucket).expect("bucket exists");
        bucket_state.objects.push(identifier);
    }

    /// Every deletion of `key` is refused with `code`.
    pub fn refuse_key(&self, key: &str, code: &str) {
        self.state
            .lock()
            .unwrap()
            .refused_keys
            .insert(key.to_string(), code.to_string());
    }

    /// The next `times` deletions of `key` are refused with `SlowDown`.
    pub fn throttle_key(&self, key: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .throttled_keys
            .insert(key.to_string(), times);
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(bucket)
    }

    pub fn objects(&self, bucket: &str) -> Vec<ObjectIdentifier> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .map(|b| b.objects.clone())
            .unwrap_or_default()
    }

    pub fn batch_calls(&self) -> usize {
        self.state.lock().unwrap().batch_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

fn no_such_bucket(bucket: &Bucket) -> anyhow::Error {
    anyhow!(DeletionError::NotFound(format!(
        "The specified bucket does not exist: {bucket}"
    )))
}

#[async_trait]
impl StorageTrait for InMemoryStore {
    async fn get_bucket_region(&self, bucket: &Bucket) -> Result<Region> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket.as_str())
            .map(|b| b.region)
            .ok_or_else(|| no_such_bucket(bucket))
    }

    async fn list_object_versions(
        &self,
        bucket: &Bucket,
        region: Region,
        prefix: Option<&str>,
        continuation: Option<ContinuationToken>,
        max_keys: i32,
    ) -> Result<ObjectVersionPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;

        let bucket_state = state
            .buckets
            .get(bucket.as_str())
            .ok_or_else(|| no_such_bucket(bucket))?;
        if bucket_state.region != region {
            return Err(anyhow!(DeletionError::Other {
                code: "PermanentRedirect".to_string(),
                message: format!("bucket lives in {}", bucket_state.region),
            }));
        }

        let matching: Vec<&ObjectIdentifier> = bucket_state
            .objects
            .iter()
            .filter(|i| prefix.is_none_or(|p| i.key.starts_with(p)))
            .collect();
        let start = continuation
            .and_then(|c| c.key_marker)
            .and_then(|marker| marker.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (start + max_keys.max(1) as usize).min(matching.len());

        Ok(ObjectVersionPage {
            identifiers: matching[start..end].iter().map(|i| (*i).clone()).collect(),
            next: (end < matching.len()).then(|| ContinuationToken {
                key_marker: Some(end.to_string()),
                version_id_marker: None,
            }),
        })
    }

    async fn delete_object_batch(
        &self,
        bucket: &Bucket,
        _region: Region,
        identifiers: &[ObjectIdentifier],
    ) -> Result<BatchDeleteOutput> {
        // let sibling chunks interleave
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.batch_calls += 1;

        let mut output = BatchDeleteOutput::default();
        for identifier in identifiers {
            if let Some(code) = state.refused_keys.get(&identifier.key).cloned() {
                output.errors.push(BatchDeleteError {
                    identifier: identifier.clone(),
                    code,
                    message: "refused".to_string(),
                });
                continue;
            }
            if let Some(remaining) = state.throttled_keys.get_mut(&identifier.key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    output.errors.push(BatchDeleteError {
                        identifier: identifier.clone(),
                        code: "SlowDown".to_string(),
                        message: "Please reduce your request rate.".to_string(),
                    });
                    continue;
                }
            }
            output.deleted.push(identifier.clone());
        }

        let bucket_state = state
            .buckets
            .get_mut(bucket.as_str())
            .ok_or_else(|| no_such_bucket(bucket))?;
        bucket_state
            .objects
            .retain(|object| !output.deleted.contains(object));

        Ok(output)
    }

    async fn delete_bucket(&self, bucket: &Bucket, _region: Region) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.buckets.get(bucket.as_str()) {
            None => Err(no_such_bucket(bucket)),
            Some(b) if !b.objects.is_empty() => Err(anyhow!(DeletionError::PreconditionFailed(
                "The bucket you tried to delete is not empty".to_string()
            ))),
            Some(_) => {
                state.buckets.remove(bucket.as_str());
                Ok(())
            }
        }
    }
}

/// Retries transient errors without waiting.
pub struct ImmediateRetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy for ImmediateRetryPolicy {
    fn is_retryable(&self, err: &anyhow::Error) -> bool {
        is_retryable_error(err)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn next_delay(&self, _attempt: u32) -> Result<Duration> {
        Ok(Duration::ZERO)
    }
}
