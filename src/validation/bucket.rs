use std::fmt;

use super::ValidationError;

const MIN_BUCKET_NAME_LENGTH: usize = 3;
const MAX_BUCKET_NAME_LENGTH: usize = 63;

const FORBIDDEN_PREFIXES: [&str; 2] = ["xn--", "sthree-"];
const FORBIDDEN_SUFFIXES: [&str; 2] = ["-s3alias", "--ol-s3"];
const FORBIDDEN_SEQUENCES: [&str; 2] = ["..", "--"];

/// A bucket name that has passed [`validate_bucket_name`].
///
/// The only way to obtain a `Bucket` is through [`Bucket::new`] (or
/// `TryFrom`/`FromStr`), so holding one proves the name is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bucket(String);

impl Bucket {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        validate_bucket_name(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Bucket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Bucket {
    type Error = ValidationError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Bucket::new(name)
    }
}

impl std::str::FromStr for Bucket {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Bucket::new(name)
    }
}

/// Check a general purpose bucket name against the S3 naming rules.
///
/// Rules are checked in a fixed order (length, charset, prefix, suffix,
/// sequence) and the first broken rule is reported.
pub fn validate_bucket_name(name: &str) -> Result<(), ValidationError> {
    if !(MIN_BUCKET_NAME_LENGTH..=MAX_BUCKET_NAME_LENGTH).contains(&name.len()) {
        return Err(ValidationError::BucketNameLength {
            name: name.to_string(),
        });
    }

    if !has_valid_charset(name) {
        return Err(ValidationError::BucketNameCharset {
            name: name.to_string(),
        });
    }

    if let Some(prefix) = FORBIDDEN_PREFIXES.iter().find(|p| name.starts_with(*p)) {
        return Err(ValidationError::BucketNamePrefix {
            name: name.to_string(),
            prefix,
        });
    }

    if let Some(suffix) = FORBIDDEN_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
        return Err(ValidationError::BucketNameSuffix {
            name: name.to_string(),
            suffix,
        });
    }

    if let Some(sequence) = FORBIDDEN_SEQUENCES.iter().find(|s| name.contains(*s)) {
        return Err(ValidationError::BucketNameSequence {
            name: name.to_string(),
            sequence,
        });
    }

    Ok(())
}

fn has_valid_charset(name: &str) -> bool {
    let bytes = name.as_bytes();
    let is_edge = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    if !is_edge(first) || !is_edge(last) {
        return false;
    }

    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'.' || *b == b'-')
}
