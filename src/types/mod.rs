use std::collections::HashSet;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

use crate::validation::{Bucket, ValidationError};

pub mod error;
pub mod token;

/// One concrete object, or one specific version of an object.
///
/// Equality and hashing use the `(key, version_id)` pair, so two versions of
/// the same key are distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectIdentifier {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }

    pub fn with_version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.version_id {
            Some(version_id) => write!(f, "{} (version {})", self.key, version_id),
            None => f.write_str(&self.key),
        }
    }
}

/// Ordered, duplicate-free collection of [`ObjectIdentifier`]s.
///
/// Insertion order is kept so progress reporting and tests are deterministic.
/// Adding an identifier that is already present is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectIdentifierSet {
    identifiers: Vec<ObjectIdentifier>,
    seen: HashSet<ObjectIdentifier>,
}

impl ObjectIdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an identifier. Returns `Ok(false)` if it was already present.
    pub fn add(&mut self, identifier: ObjectIdentifier) -> Result<bool, ValidationError> {
        if identifier.key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if !self.seen.insert(identifier.clone()) {
            return Ok(false);
        }
        self.identifiers.push(identifier);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn contains(&self, identifier: &ObjectIdentifier) -> bool {
        self.seen.contains(identifier)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectIdentifier> {
        self.identifiers.iter()
    }

    pub fn as_slice(&self) -> &[ObjectIdentifier] {
        &self.identifiers
    }

    pub fn into_vec(self) -> Vec<ObjectIdentifier> {
        self.identifiers
    }

    /// Partition the set, in order, into consecutive sets of at most
    /// `max_size` identifiers. A `max_size` of zero is treated as one.
    ///
    /// The returned iterator borrows the set; calling `chunks` again starts
    /// over from the first identifier.
    pub fn chunks(&self, max_size: usize) -> impl Iterator<Item = ObjectIdentifierSet> + '_ {
        self.identifiers
            .chunks(max_size.max(1))
            .map(ObjectIdentifierSet::from_unique_slice)
    }

    fn from_unique_slice(identifiers: &[ObjectIdentifier]) -> Self {
        Self {
            identifiers: identifiers.to_vec(),
            seen: identifiers.iter().cloned().collect(),
        }
    }
}

impl TryFrom<Vec<ObjectIdentifier>> for ObjectIdentifierSet {
    type Error = ValidationError;

    fn try_from(identifiers: Vec<ObjectIdentifier>) -> Result<Self, Self::Error> {
        let mut set = ObjectIdentifierSet::new();
        for identifier in identifiers {
            set.add(identifier)?;
        }
        Ok(set)
    }
}

impl<'a> IntoIterator for &'a ObjectIdentifierSet {
    type Item = &'a ObjectIdentifier;
    type IntoIter = std::slice::Iter<'a, ObjectIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.identifiers.iter()
    }
}

/// A bucket, optionally narrowed to a key prefix.
///
/// Parsed once from `s3://<bucket>[/<prefix>]` at the CLI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTarget {
    pub bucket: Bucket,
    pub key: Option<String>,
}

impl BucketTarget {
    pub fn new(bucket: Bucket, key: Option<String>) -> Self {
        let key = key.filter(|k| !k.is_empty());
        Self { bucket, key }
    }

    /// Parse an `s3://bucket[/prefix]` URI.
    pub fn parse(uri: &str) -> Result<Self, ValidationError> {
        let without_scheme = uri.strip_prefix("s3://").ok_or_else(|| {
            ValidationError::InvalidTarget(format!("'{uri}' must start with 's3://'"))
        })?;

        let (bucket, key) = match without_scheme.split_once('/') {
            Some((bucket, key)) => (bucket, Some(key.to_string())),
            None => (without_scheme, None),
        };

        if bucket.is_empty() {
            return Err(ValidationError::InvalidTarget(format!(
                "'{uri}' has no bucket name"
            )));
        }

        Ok(Self::new(Bucket::new(bucket)?, key))
    }
}

impl fmt::Display for BucketTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "s3://{}/{}", self.bucket, key),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

/// Lifecycle phase of one orchestrator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPhase {
    Idle,
    ResolvingRegion,
    Listing,
    Chunking,
    Dispatching,
    Aggregating,
    Done(OutcomeStatus),
}

/// Terminal status of a [`DeleteOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutcomeStatus {
    #[default]
    Success,
    /// Some identifiers could not be deleted; the rest were.
    PartialFailure,
    /// The call aborted before any chunk was dispatched.
    FatalFailure,
    Cancelled,
}

/// An identifier that could not be deleted, with the cause reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedIdentifier {
    pub identifier: ObjectIdentifier,
    pub error_code: String,
    pub error_message: String,
}

/// Aggregate result of one bulk delete call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
    pub failed: Vec<FailedIdentifier>,
    pub status: OutcomeStatus,
}

impl DeleteOutcome {
    pub fn failed_count(&self) -> u64 {
        self.failed.len() as u64
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success && self.failed.is_empty()
    }

    pub(crate) fn fatal() -> Self {
        Self {
            status: OutcomeStatus::FatalFailure,
            ..Self::default()
        }
    }
}

/// Progress events sent through the stats channel while a call runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletionStatistics {
    ObjectsListed(u64),
    DeleteComplete {
        key: String,
        version_id: Option<String>,
    },
    DeleteError {
        key: String,
        version_id: Option<String>,
    },
    DeleteRetry {
        chunk_index: usize,
        attempt: u32,
    },
    ChunkComplete {
        chunk_index: usize,
        deleted: u64,
        failed: u64,
    },
    PhaseChanged(DeletionPhase),
}

/// Lock-free counters shared by all chunk tasks of a [`BulkDeleter`](crate::BulkDeleter).
#[derive(Debug, Default)]
pub struct DeletionStatsReport {
    listed: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    chunks_completed: AtomicU64,
}

/// Point-in-time copy of a [`DeletionStatsReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletionStats {
    pub stats_listed_objects: u64,
    pub stats_deleted_objects: u64,
    pub stats_failed_objects: u64,
    pub stats_retried_requests: u64,
    pub stats_completed_chunks: u64,
}

impl DeletionStatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_listed(&self, count: u64) {
        self.listed.fetch_add(count, Ordering::SeqCst);
    }

    pub fn increment_deleted(&self, count: u64) {
        self.deleted.fetch_add(count, Ordering::SeqCst);
    }

    pub fn increment_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::SeqCst);
    }

    pub fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_chunks_completed(&self) {
        self.chunks_completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.listed.store(0, Ordering::SeqCst);
        self.deleted.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.retried.store(0, Ordering::SeqCst);
        self.chunks_completed.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> DeletionStats {
        DeletionStats {
            stats_listed_objects: self.listed.load(Ordering::SeqCst),
            stats_deleted_objects: self.deleted.load(Ordering::SeqCst),
            stats_failed_objects: self.failed.load(Ordering::SeqCst),
            stats_retried_requests: self.retried.load(Ordering::SeqCst),
            stats_completed_chunks: self.chunks_completed.load(Ordering::SeqCst),
        }
    }
}

/// AWS configuration file locations.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// Where the S3 client gets its credentials from.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair, cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
