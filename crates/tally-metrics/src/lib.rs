//! In-process metric store with point-in-time snapshots.
//!
//! A [`MetricContext`] holds counters (with derived rates), gauges, basic
//! counters and sampled distributions. [`MetricContext::snapshot`] reads them
//! into an immutable [`Snapshot`], which [`codec`] turns into the JSON wire
//! format served by [`http::router`].

pub mod clock;
pub mod codec;
pub mod context;
pub mod error;
pub mod http;
mod logging;
pub mod metric;
pub mod snapshot;
pub mod window;

#[cfg(test)]
mod tests;

pub use context::{reject_nan, MetricContext, OutputFilter, SamplingConfig};
pub use error::{CodecError, MetricError};
pub use metric::{MetricKind, Rate};
pub use snapshot::{PercentileValue, Snapshot, SnapshotEntry, PERCENTILES};
