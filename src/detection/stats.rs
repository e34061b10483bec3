/// Per-strategy detection counters
use std::collections::HashMap;
use std::time::Duration;

use super::strategy::DetectionStrategy;

/// Counters are monotonic; callers only ever see snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionStats {
    attempts: HashMap<DetectionStrategy, u64>,
    hits: HashMap<DetectionStrategy, u64>,
    /// Completed detection calls (throttled calls are not counted)
    pub total_calls: u64,
    /// Calls that produced a winner
    pub total_hits: u64,
    /// Strategy that produced the most recent winner
    pub last_strategy: Option<DetectionStrategy>,
    /// Wall time of the most recent completed call
    pub last_latency: Duration,
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&mut self, strategy: DetectionStrategy) {
        *self.attempts.entry(strategy).or_insert(0) += 1;
    }

    pub(crate) fn record_hit(&mut self, strategy: DetectionStrategy) {
        *self.hits.entry(strategy).or_insert(0) += 1;
        self.total_hits += 1;
        self.last_strategy = Some(strategy);
    }

    pub(crate) fn record_call(&mut self, latency: Duration) {
        self.total_calls += 1;
        self.last_latency = latency;
    }

    pub fn attempts(&self, strategy: DetectionStrategy) -> u64 {
        self.attempts.get(&strategy).copied().unwrap_or(0)
    }

    pub fn hits(&self, strategy: DetectionStrategy) -> u64 {
        self.hits.get(&strategy).copied().unwrap_or(0)
    }

    /// Share of completed calls that produced a winner
    pub fn hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_hits as f64 / self.total_calls as f64
        }
    }
}
