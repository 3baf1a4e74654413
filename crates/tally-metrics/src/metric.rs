use crate::clock::Clock;
use crate::error::{MetricError, Result};
use crate::snapshot::{PercentileValue, SnapshotEntry, PERCENTILES};
use crate::window::SampleWindow;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// The four metric kinds a store can hold.
///
/// The derived ordering is the order kinds appear in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    BasicCounter,
    StatsTimer,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::BasicCounter => write!(f, "basiccounter"),
            Self::StatsTimer => write!(f, "statstimer"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    /// Accepts both the wire names and the plural path segments used by
    /// the HTTP endpoint (`Counters`, `Gauges`, `BasicCounters`, `StatTimers`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" | "counters" => Ok(Self::Counter),
            "gauge" | "gauges" => Ok(Self::Gauge),
            "basiccounter" | "basiccounters" => Ok(Self::BasicCounter),
            "statstimer" | "statstimers" | "stattimers" => Ok(Self::StatsTimer),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

/// Result of one rate computation on a counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub per_sec: f64,
    /// Time since the previous rate computation on the same counter.
    pub elapsed: Duration,
}

#[derive(Debug)]
struct RateSample {
    value: u64,
    at: Duration,
}

#[derive(Debug)]
pub(crate) struct Counter {
    value: AtomicU64,
    previous: Mutex<RateSample>,
}

impl Counter {
    fn new(now: Duration) -> Self {
        Self {
            value: AtomicU64::new(0),
            previous: Mutex::new(RateSample { value: 0, at: now }),
        }
    }

    pub(crate) fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Rate since the previous call; moves the previous sample to now.
    ///
    /// The clock is read under the lock so concurrent callers see
    /// non-decreasing sample times.
    pub(crate) fn compute_rate(&self, clock: &dyn Clock) -> Rate {
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        let now = clock.now();
        let current = self.get();
        let delta = current.saturating_sub(previous.value) as f64;
        let elapsed = now.saturating_sub(previous.at);
        previous.value = current;
        previous.at = now;

        let per_sec = if delta == 0.0 {
            0.0
        } else {
            delta / elapsed.as_secs_f64()
        };
        Rate { per_sec, elapsed }
    }
}

#[derive(Debug)]
pub(crate) struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub(crate) fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub(crate) struct BasicCounter {
    value: AtomicU64,
}

impl BasicCounter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub(crate) fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub(crate) struct StatsTimer {
    samples: Mutex<SampleWindow>,
}

impl StatsTimer {
    fn new(capacity: usize, window: Option<Duration>) -> Self {
        Self {
            samples: Mutex::new(SampleWindow::new(capacity, window)),
        }
    }

    pub(crate) fn observe(&self, now: Duration, sample: f64) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(now, sample);
    }

    /// Sorted copy of the live samples. The lock is released before sorting.
    fn sorted(&self, now: Duration) -> Vec<f64> {
        let mut values = self
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values(now);
        values.sort_by(f64::total_cmp);
        values
    }

    pub(crate) fn percentile(&self, name: &str, now: Duration, p: f64) -> Result<f64> {
        if !(p > 0.0 && p <= 100.0) {
            return Err(MetricError::InvalidPercentile(p));
        }
        let sorted = self.sorted(now);
        if sorted.is_empty() {
            return Err(MetricError::EmptyDistribution(name.to_string()));
        }
        Ok(rank_value(&sorted, p))
    }

    pub(crate) fn percentiles(&self, now: Duration) -> Vec<PercentileValue> {
        let sorted = self.sorted(now);
        if sorted.is_empty() {
            return Vec::new();
        }
        PERCENTILES
            .iter()
            .map(|&p| PercentileValue::new(p, rank_value(&sorted, p)))
            .collect()
    }
}

/// Thousandths of a percent; ranks are exact for percentiles with up to
/// three decimals.
const PERCENT_SCALE: u128 = 100_000;

/// Nearest-rank percentile: the value at 1-based rank `ceil(p/100 * n)`.
///
/// `sorted` must be non-empty and `p` in `(0, 100]`. The rank is computed in
/// integers so `99.9%` of 1000 is rank 999 for any sample count.
fn rank_value(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let scaled = (p * 1000.0).round() as u128;
    let rank = (scaled * n as u128).div_ceil(PERCENT_SCALE);
    let rank = usize::try_from(rank).unwrap_or(n);
    sorted[rank.clamp(1, n) - 1]
}

/// A registered metric. Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub(crate) enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    BasicCounter(Arc<BasicCounter>),
    StatsTimer(Arc<StatsTimer>),
}

impl Metric {
    pub(crate) fn create(
        kind: MetricKind,
        now: Duration,
        capacity: usize,
        window: Option<Duration>,
    ) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Arc::new(Counter::new(now))),
            MetricKind::Gauge => Self::Gauge(Arc::new(Gauge::new())),
            MetricKind::BasicCounter => Self::BasicCounter(Arc::new(BasicCounter::new())),
            MetricKind::StatsTimer => Self::StatsTimer(Arc::new(StatsTimer::new(capacity, window))),
        }
    }

    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::BasicCounter(_) => MetricKind::BasicCounter,
            Self::StatsTimer(_) => MetricKind::StatsTimer,
        }
    }

    /// Reads the current value into a snapshot entry. Reading a counter
    /// computes (and therefore advances) its rate.
    pub(crate) fn read(&self, name: String, clock: &dyn Clock) -> SnapshotEntry {
        match self {
            Self::Counter(c) => SnapshotEntry::Counter {
                name,
                value: c.get(),
                rate: c.compute_rate(clock).per_sec,
            },
            Self::Gauge(g) => SnapshotEntry::Gauge {
                name,
                value: g.get(),
            },
            Self::BasicCounter(c) => SnapshotEntry::BasicCounter {
                name,
                value: c.get(),
            },
            Self::StatsTimer(t) => SnapshotEntry::StatsTimer {
                name,
                percentiles: t.percentiles(clock.now()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_value_uses_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(rank_value(&sorted, 50.0), 50.0);
        assert_eq!(rank_value(&sorted, 99.0), 99.0);
        assert_eq!(rank_value(&sorted, 100.0), 100.0);
        assert_eq!(rank_value(&sorted, 0.5), 1.0);

        let thousand: Vec<f64> = (1..=1000).map(f64::from).collect();
        assert_eq!(rank_value(&thousand, 99.9), 999.0);
        assert_eq!(rank_value(&thousand, 99.999), 1000.0);
    }

    #[test]
    fn rank_value_is_exact_for_large_samples() {
        let sorted: Vec<f64> = (1..=1_000_000).map(f64::from).collect();
        assert_eq!(rank_value(&sorted, 99.9), 999_000.0);
        assert_eq!(rank_value(&sorted, 99.99), 999_900.0);
        assert_eq!(rank_value(&sorted, 50.0), 500_000.0);
        assert_eq!(rank_value(&sorted, 0.001), 10.0);
    }

    #[test]
    fn metric_kind_parses_path_segments() {
        assert_eq!("Counters".parse::<MetricKind>(), Ok(MetricKind::Counter));
        assert_eq!("StatTimers".parse::<MetricKind>(), Ok(MetricKind::StatsTimer));
        assert!("histograms".parse::<MetricKind>().is_err());
    }
}
