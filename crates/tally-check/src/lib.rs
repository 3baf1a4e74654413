//! Threshold checks over metric snapshots.
//!
//! A [`CheckConfig`] is loaded from TOML; each section holds an `expr`
//! plus the messages to report when it is true or false. A
//! [`CheckEngine`] compiles every section once and then evaluates them
//! against snapshots taken from a [`SnapshotSource`], either the local
//! [`tally_metrics::MetricContext`] or a peer's HTTP endpoint.
//!
//! Failing to acquire a snapshot aborts the cycle with a [`CheckError`].
//! A section that fails to compile or evaluate is logged and skipped; the
//! other sections still report.

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod format;
pub mod source;


pub use config::{CheckConfig, CheckSpec, TransportConfig};
pub use engine::{CheckEngine, CheckResult};
pub use error::CheckError;
pub use format::OutputFormat;
pub use source::{HttpSource, LocalSource, Origin, SnapshotSource};
