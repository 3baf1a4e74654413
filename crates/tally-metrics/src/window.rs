use std::collections::VecDeque;
use std::time::Duration;

/// Bounded ring of timestamped samples.
///
/// Holds at most `capacity` samples; pushing into a full window overwrites
/// the oldest one. When a time window is set, samples older than
/// `now - window` are evicted on push and skipped on read.
#[derive(Debug)]
pub struct SampleWindow {
    capacity: usize,
    window: Option<Duration>,
    data: VecDeque<(Duration, f64)>,
}

impl SampleWindow {
    pub fn new(capacity: usize, window: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            data: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, at: Duration, value: f64) {
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back((at, value));
        self.evict(at);
    }

    pub fn evict(&mut self, now: Duration) {
        let Some(cutoff) = self.cutoff(now) else {
            return;
        };
        while let Some((at, _)) = self.data.front() {
            if *at < cutoff {
                self.data.pop_front();
            } else {
                break;
            }
        }
    }

    /// Copies out the samples still inside the window at `now`.
    pub fn values(&self, now: Duration) -> Vec<f64> {
        let cutoff = self.cutoff(now).unwrap_or(Duration::ZERO);
        self.data
            .iter()
            .filter(|(at, _)| *at >= cutoff)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn cutoff(&self, now: Duration) -> Option<Duration> {
        self.window.map(|window| now.saturating_sub(window))
    }
}
