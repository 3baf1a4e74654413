use crate::metric::MetricKind;
use serde::{Deserialize, Serialize};

/// Percentiles reported for every distribution in a snapshot.
pub const PERCENTILES: [f64; 7] = [50.0, 75.0, 95.0, 99.0, 99.9, 99.99, 99.999];

/// One percentile of a distribution, labelled the way the wire format
/// expects (`"99.900000"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: String,
    #[serde(with = "nullable_f64")]
    pub value: f64,
}

impl PercentileValue {
    pub fn new(percentile: f64, value: f64) -> Self {
        Self {
            percentile: format!("{percentile:.6}"),
            value,
        }
    }

    /// The numeric percentile, if the label parses.
    pub fn point(&self) -> Option<f64> {
        self.percentile.parse().ok()
    }
}

/// A single metric as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SnapshotEntry {
    Counter {
        name: String,
        value: u64,
        #[serde(with = "nullable_f64", default = "nullable_f64::nan")]
        rate: f64,
    },
    Gauge {
        name: String,
        #[serde(with = "nullable_f64")]
        value: f64,
    },
    BasicCounter {
        name: String,
        value: u64,
    },
    StatsTimer {
        name: String,
        #[serde(default)]
        percentiles: Vec<PercentileValue>,
    },
}

impl SnapshotEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Counter { name, .. }
            | Self::Gauge { name, .. }
            | Self::BasicCounter { name, .. }
            | Self::StatsTimer { name, .. } => name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter { .. } => MetricKind::Counter,
            Self::Gauge { .. } => MetricKind::Gauge,
            Self::BasicCounter { .. } => MetricKind::BasicCounter,
            Self::StatsTimer { .. } => MetricKind::StatsTimer,
        }
    }

    /// True for counters with a NaN rate and gauges holding NaN.
    pub fn has_nan(&self) -> bool {
        match self {
            Self::Counter { rate, .. } => rate.is_nan(),
            Self::Gauge { value, .. } => value.is_nan(),
            Self::BasicCounter { .. } | Self::StatsTimer { .. } => false,
        }
    }
}

/// An immutable, ordered, point-in-time view of a metric store.
///
/// Serializes as a bare JSON array of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// A new snapshot restricted to one kind, order preserved.
    pub fn only(&self, kind: MetricKind) -> Self {
        Self::new(
            self.entries
                .iter()
                .filter(|e| e.kind() == kind)
                .cloned()
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<SnapshotEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// JSON has no NaN or infinity: non-finite floats travel as `null` and
/// come back as NaN.
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn nan() -> f64 {
        f64::NAN
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
