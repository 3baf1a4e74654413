use crate::metric::MetricKind;

/// Errors returned by [`crate::MetricContext`] operations.
///
/// # Examples
///
/// ```rust
/// use tally_metrics::error::MetricError;
///
/// let err = MetricError::EmptyDistribution("db.query_ms".to_string());
/// assert!(err.to_string().contains("db.query_ms"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// The name is already owned by a metric of another kind.
    #[error("metric '{name}' is registered as {existing}, not {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    /// A percentile was requested from a distribution with no retained samples.
    #[error("distribution '{0}' has no samples")]
    EmptyDistribution(String),

    /// Percentiles must lie in `(0, 100]`.
    #[error("percentile {0} is outside (0, 100]")]
    InvalidPercentile(f64),

    /// A read was issued for a name that was never registered.
    #[error("metric '{0}' is not registered")]
    NotFound(String),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, MetricError>;

/// Errors produced while encoding or decoding a wire snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not a JSON array of metric objects.
    #[error("malformed snapshot payload: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}
