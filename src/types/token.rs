/// A cancellation token used to stop a running bulk delete.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. Pass the
/// token to [`BulkDeleter::new`](crate::BulkDeleter::new) and call
/// [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it to stop
/// listing and chunk dispatch (e.g., in a Ctrl+C handler). Chunk requests
/// already in flight are allowed to finish.
pub type DeletionCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`DeletionCancellationToken`].
///
/// # Example
///
/// ```
/// use s3clean_rs::create_deletion_cancellation_token;
///
/// let token = create_deletion_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_deletion_cancellation_token() -> DeletionCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
