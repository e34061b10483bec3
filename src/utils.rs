use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Minimum-interval gate for repeated detection calls
pub struct Throttle {
    last_run: Option<Instant>,
    interval: Duration,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_run: None,
            interval,
        }
    }

    /// Returns true (and restarts the interval) if enough time has passed
    /// since the last accepted call
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();

        match self.last_run {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Forget the last call so the next one runs immediately
    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

/// Samples kept by [`LatencyStats::new`]
pub const DEFAULT_LATENCY_WINDOW: usize = 10_000;

/// Latency samples for one kind of work (e.g. a scheduler cycle)
///
/// Only the most recent `window` samples are kept, so a long-running process
/// reports on recent behaviour in constant memory.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    samples_us: VecDeque<f64>,
    window: usize,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LATENCY_WINDOW)
    }
}

/// Mean and percentiles in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencySummary {
    pub mean_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` samples (at least one), oldest evicted first
    pub fn with_capacity(capacity: usize) -> Self {
        let window = capacity.max(1);
        Self {
            samples_us: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn add(&mut self, elapsed: Duration) {
        if self.samples_us.len() == self.window {
            self.samples_us.pop_front();
        }
        self.samples_us.push_back(elapsed.as_nanos() as f64 / 1000.0);
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_us.is_empty()
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    pub fn summary(&self) -> LatencySummary {
        if self.samples_us.is_empty() {
            return LatencySummary::default();
        }

        let mut values: Vec<f64> = self.samples_us.iter().copied().collect();
        values.sort_by(|a, b| a.total_cmp(b));

        LatencySummary {
            mean_us: values.iter().sum::<f64>() / values.len() as f64,
            p50_us: Self::percentile(&values, 50.0),
            p95_us: Self::percentile(&values, 95.0),
            p99_us: Self::percentile(&values, 99.0),
        }
    }

    /// Log a one-line report, flagging p95 above `budget`
    pub fn log_report(&self, label: &str, budget: Duration) {
        if self.samples_us.is_empty() {
            tracing::info!("{}: no timing data collected", label);
            return;
        }

        let s = self.summary();
        tracing::info!(
            "{}: {} samples, mean {:.0} µs, p50 {:.0} µs, p95 {:.0} µs, p99 {:.0} µs",
            label,
            self.samples_us.len(),
            s.mean_us,
            s.p50_us,
            s.p95_us,
            s.p99_us
        );

        let budget_us = budget.as_secs_f64() * 1_000_000.0;
        if s.p95_us >= budget_us {
            tracing::warn!(
                "{}: p95 latency {:.2} ms exceeds the {:.0} ms budget",
                label,
                s.p95_us / 1000.0,
                budget_us / 1000.0
            );
        }
    }
}
