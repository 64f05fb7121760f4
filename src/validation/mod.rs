//! Input validation for bucket names, regions and object keys.
//!
//! Everything here is a pure function over its input: no I/O, no shared
//! state. Validation runs at every orchestrator entry point before any store
//! call is made.

use thiserror::Error;

pub mod bucket;
pub mod region;

pub use bucket::{Bucket, validate_bucket_name};
pub use region::Region;

/// A rejected user- or config-supplied value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("bucket name '{name}' must be between 3 and 63 characters long")]
    BucketNameLength { name: String },

    #[error(
        "bucket name '{name}' may only contain lowercase letters, numbers, dots and hyphens, and must begin and end with a letter or number"
    )]
    BucketNameCharset { name: String },

    #[error("bucket name '{name}' must not start with '{prefix}'")]
    BucketNamePrefix { name: String, prefix: &'static str },

    #[error("bucket name '{name}' must not end with '{suffix}'")]
    BucketNameSuffix { name: String, suffix: &'static str },

    #[error("bucket name '{name}' must not contain '{sequence}'")]
    BucketNameSequence {
        name: String,
        sequence: &'static str,
    },

    #[error("region must not be empty")]
    EmptyRegion,

    #[error("invalid region: '{0}'")]
    InvalidRegion(String),

    #[error("object key must not be empty")]
    EmptyKey,

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}
