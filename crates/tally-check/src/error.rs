use std::time::Duration;
use tally_metrics::CodecError;

/// Errors that abort a whole check cycle.
///
/// Problems confined to one section (a bad expression, a non-bool result)
/// are logged and skipped instead.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tally_check::error::CheckError;
///
/// let err = CheckError::Timeout(Duration::from_secs(5));
/// assert!(err.to_string().contains("5s"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The peer could not be reached or the transfer failed.
    #[error("failed to fetch snapshot: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("snapshot fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with a non-success status.
    #[error("snapshot endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// The payload was not a snapshot.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Convenience `Result` alias for cycle operations.
pub type Result<T> = std::result::Result<T, CheckError>;
