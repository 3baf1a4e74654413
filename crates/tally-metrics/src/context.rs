use crate::clock::{Clock, MonotonicClock};
use crate::error::{MetricError, Result};
use crate::metric::{Metric, MetricKind, Rate};
use crate::snapshot::{Snapshot, SnapshotEntry};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Predicate deciding whether a metric appears in a snapshot.
pub type OutputFilter = Arc<dyn Fn(&str, &SnapshotEntry) -> bool + Send + Sync>;

/// Retention settings for distributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Maximum samples kept per distribution; the oldest is overwritten.
    #[serde(default = "default_sample_capacity")]
    pub capacity: usize,
    /// Samples older than this are dropped. 0 keeps samples until overwritten.
    #[serde(default = "default_sample_window_secs")]
    pub window_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            capacity: default_sample_capacity(),
            window_secs: default_sample_window_secs(),
        }
    }
}

fn default_sample_capacity() -> usize {
    1024
}

fn default_sample_window_secs() -> u64 {
    60
}

impl SamplingConfig {
    fn window(&self) -> Option<Duration> {
        (self.window_secs > 0).then(|| Duration::from_secs(self.window_secs))
    }
}

/// Keeps NaN counter rates and NaN gauges out of a snapshot.
pub fn reject_nan(_name: &str, entry: &SnapshotEntry) -> bool {
    !entry.has_nan()
}

/// A namespaced, concurrently updatable set of metrics.
///
/// Every name belongs to exactly one metric kind. Updates auto-register the
/// metric on first use; updating a name under another kind fails with
/// [`MetricError::KindConflict`].
///
/// The registry is a sharded map and each metric carries its own atomics or
/// mutex, so writers to different metrics never contend on a shared lock.
///
/// # Examples
///
/// ```
/// use tally_metrics::MetricContext;
///
/// let metrics = MetricContext::new("api");
/// metrics.increment_counter("requests", 3).unwrap();
/// metrics.set_gauge("queue.depth", 12.0).unwrap();
/// assert_eq!(metrics.counter_value("requests").unwrap(), 3);
/// assert_eq!(metrics.snapshot().len(), 2);
/// ```
pub struct MetricContext {
    namespace: String,
    metrics: DashMap<String, Metric>,
    clock: Arc<dyn Clock>,
    sampling: SamplingConfig,
    output_filter: RwLock<OutputFilter>,
}

impl MetricContext {
    pub fn new(namespace: &str) -> Self {
        Self::with_config(
            namespace,
            SamplingConfig::default(),
            Arc::new(MonotonicClock::new()),
        )
    }

    pub fn with_config(namespace: &str, sampling: SamplingConfig, clock: Arc<dyn Clock>) -> Self {
        let accept_all: OutputFilter = Arc::new(|_: &str, _: &SnapshotEntry| true);
        Self {
            namespace: namespace.to_string(),
            metrics: DashMap::new(),
            clock,
            sampling,
            output_filter: RwLock::new(accept_all),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(|m| m.kind())
    }

    pub fn set_output_filter(&self, filter: OutputFilter) {
        *self
            .output_filter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = filter;
    }

    pub fn increment_counter(&self, name: &str, delta: u64) -> Result<()> {
        self.resolve(name, MetricKind::Counter, |m| match m {
            Metric::Counter(c) => {
                c.add(delta);
                Some(())
            }
            _ => None,
        })
    }

    pub fn set_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.resolve(name, MetricKind::Gauge, |m| match m {
            Metric::Gauge(g) => {
                g.set(value);
                Some(())
            }
            _ => None,
        })
    }

    pub fn increment_basic(&self, name: &str, delta: u64) -> Result<()> {
        self.resolve(name, MetricKind::BasicCounter, |m| match m {
            Metric::BasicCounter(c) => {
                c.add(delta);
                Some(())
            }
            _ => None,
        })
    }

    pub fn observe(&self, name: &str, sample: f64) -> Result<()> {
        let now = self.clock.now();
        self.resolve(name, MetricKind::StatsTimer, |m| match m {
            Metric::StatsTimer(t) => {
                t.observe(now, sample);
                Some(())
            }
            _ => None,
        })
    }

    /// Registers `name` as `kind`. Registering an existing same-kind name is
    /// a no-op.
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<()> {
        self.resolve(name, kind, |m| (m.kind() == kind).then_some(()))
    }

    /// Removes `name` if it is registered as `kind`. Returns whether anything
    /// was removed.
    pub fn unregister(&self, name: &str, kind: MetricKind) -> bool {
        self.metrics
            .remove_if(name, |_, m| m.kind() == kind)
            .is_some()
    }

    pub fn counter_value(&self, name: &str) -> Result<u64> {
        self.lookup(name, MetricKind::Counter, |m| match m {
            Metric::Counter(c) => Some(c.get()),
            _ => None,
        })
    }

    /// Computes the counter's rate since the previous computation and makes
    /// now the new reference point. Not idempotent.
    pub fn counter_rate(&self, name: &str) -> Result<Rate> {
        self.lookup(name, MetricKind::Counter, |m| match m {
            Metric::Counter(c) => Some(c.compute_rate(self.clock.as_ref())),
            _ => None,
        })
    }

    pub fn gauge_value(&self, name: &str) -> Result<f64> {
        self.lookup(name, MetricKind::Gauge, |m| match m {
            Metric::Gauge(g) => Some(g.get()),
            _ => None,
        })
    }

    pub fn basic_value(&self, name: &str) -> Result<u64> {
        self.lookup(name, MetricKind::BasicCounter, |m| match m {
            Metric::BasicCounter(c) => Some(c.get()),
            _ => None,
        })
    }

    pub fn percentile(&self, name: &str, p: f64) -> Result<f64> {
        let now = self.clock.now();
        let timer = self.lookup(name, MetricKind::StatsTimer, |m| match m {
            Metric::StatsTimer(t) => Some(Arc::clone(t)),
            _ => None,
        })?;
        timer.percentile(name, now, p)
    }

    /// Snapshot of every metric passing the context's output filter.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_filtered(None, &|_: &str, _: &SnapshotEntry| true)
    }

    /// Snapshot of the metrics passing both the context's output filter and
    /// `extra`. With `kind` set, other kinds are skipped before they are read,
    /// so a gauge-only snapshot does not advance counter rates.
    pub fn snapshot_filtered(
        &self,
        kind: Option<MetricKind>,
        extra: &dyn Fn(&str, &SnapshotEntry) -> bool,
    ) -> Snapshot {
        let filter: OutputFilter = self
            .output_filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.collect(kind, &|name: &str, entry: &SnapshotEntry| {
            filter(name, entry) && extra(name, entry)
        })
    }

    /// Snapshot of every metric passing `filter`, ignoring the context's own
    /// output filter.
    pub fn snapshot_with(&self, filter: &dyn Fn(&str, &SnapshotEntry) -> bool) -> Snapshot {
        self.collect(None, filter)
    }

    /// Metrics are read one at a time without a store-wide lock, so the result
    /// is consistent per metric, not across metrics. Entries are ordered by
    /// kind, then by name.
    fn collect(
        &self,
        kind: Option<MetricKind>,
        filter: &dyn Fn(&str, &SnapshotEntry) -> bool,
    ) -> Snapshot {
        let mut metrics: Vec<(String, Metric)> = self
            .metrics
            .iter()
            .filter(|e| kind.is_none() || kind == Some(e.value().kind()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        metrics.sort_by(|a, b| a.1.kind().cmp(&b.1.kind()).then_with(|| a.0.cmp(&b.0)));

        let entries = metrics
            .into_iter()
            .map(|(name, metric)| metric.read(name, self.clock.as_ref()))
            .filter(|entry| filter(entry.name(), entry))
            .collect();
        Snapshot::new(entries)
    }

    /// Plain-text dump, one metric per line. Computes counter rates.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.snapshot_with(&|_: &str, _: &SnapshotEntry| true) {
            let _ = match entry {
                SnapshotEntry::Counter { name, value, rate } => {
                    writeln!(out, "counter {name} {value} {rate:.3}")
                }
                SnapshotEntry::Gauge { name, value } => writeln!(out, "gauge {name} {value:.3}"),
                SnapshotEntry::BasicCounter { name, value } => {
                    writeln!(out, "basiccounter {name} {value}")
                }
                SnapshotEntry::StatsTimer { name, percentiles } => {
                    let values: Vec<String> =
                        percentiles.iter().map(|p| format!("{:.3}", p.value)).collect();
                    writeln!(out, "statstimer {name} {}", values.join(" "))
                }
            };
        }
        out
    }

    /// Finds `name`, registering it as `kind` if absent, and applies `pick`.
    /// `pick` returns `None` when the stored metric has another kind.
    fn resolve<T>(
        &self,
        name: &str,
        kind: MetricKind,
        pick: impl Fn(&Metric) -> Option<T>,
    ) -> Result<T> {
        if let Some(existing) = self.metrics.get(name) {
            return pick(existing.value()).ok_or_else(|| conflict(name, existing.kind(), kind));
        }
        let created = self
            .metrics
            .entry(name.to_string())
            .or_insert_with(|| {
                Metric::create(
                    kind,
                    self.clock.now(),
                    self.sampling.capacity,
                    self.sampling.window(),
                )
            })
            .downgrade();
        pick(created.value()).ok_or_else(|| conflict(name, created.kind(), kind))
    }

    fn lookup<T>(
        &self,
        name: &str,
        kind: MetricKind,
        pick: impl Fn(&Metric) -> Option<T>,
    ) -> Result<T> {
        let existing = self
            .metrics
            .get(name)
            .ok_or_else(|| MetricError::NotFound(name.to_string()))?;
        pick(existing.value()).ok_or_else(|| conflict(name, existing.kind(), kind))
    }
}

fn conflict(name: &str, existing: MetricKind, requested: MetricKind) -> MetricError {
    MetricError::KindConflict {
        name: name.to_string(),
        existing,
        requested,
    }
}
