use crate::types::BucketTarget;

const ERROR_MESSAGE_INVALID_TARGET: &str =
    "Target must be an S3 path starting with 's3://' (e.g., s3://bucket/prefix).";

/// Accepts `s3://<bucket>[/prefix]` with a valid bucket name.
pub fn check_s3_target(s: &str) -> Result<String, String> {
    if !s.starts_with("s3://") || s.len() <= 5 {
        return Err(ERROR_MESSAGE_INVALID_TARGET.to_string());
    }
    BucketTarget::parse(s).map_err(|e| e.to_string())?;

    Ok(s.to_string())
}
