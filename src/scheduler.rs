/// Periodic detection driver
///
/// A background thread ticks at a fixed interval, captures one frame and
/// runs every enabled detector on it in parallel. Results go out through a
/// bounded channel; when the consumer falls behind, new reports are dropped
/// and counted instead of blocking the capture loop.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::capture::FrameSource;
use crate::detection::{DetectionResult, Detector};
use crate::error::SchedulerError;
use crate::utils::LatencyStats;

/// Cycle timings kept for the shutdown report
pub const CYCLE_LATENCY_WINDOW: usize = 1000;

/// A registered detector. The mutex doubles as a single-flight guard: a
/// cycle that finds it held skips the detector instead of waiting.
pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

/// One detector's result for one cycle
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub detector: String,
    pub cycle: u64,
    pub result: DetectionResult,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub reports_sent: u64,
    pub reports_dropped: u64,
    pub capture_failures: u64,
    /// Detector invocations skipped because the previous one was still running
    pub skipped_busy: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    reports_sent: AtomicU64,
    reports_dropped: AtomicU64,
    capture_failures: AtomicU64,
    skipped_busy: AtomicU64,
}

/// State shared between the handle and the worker thread
struct Shared {
    detectors: RwLock<Vec<SharedDetector>>,
    report_tx: Sender<DetectionReport>,
    counters: Counters,
    cycle_latency: Mutex<LatencyStats>,
}

impl Shared {
    fn run_cycle(&self, frame: &RgbaImage) -> usize {
        let start = Instant::now();
        let cycle = self.counters.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let detectors = self.detectors.read().clone();

        let reports: Vec<DetectionReport> = detectors
            .par_iter()
            .filter_map(|shared| {
                let Some(mut detector) = shared.try_lock() else {
                    self.counters.skipped_busy.fetch_add(1, Ordering::Relaxed);
                    debug!("cycle {}: detector busy, skipped", cycle);
                    return None;
                };
                if !detector.is_enabled() {
                    return None;
                }

                let result = detector.detect(frame);
                Some(DetectionReport {
                    detector: detector.name().to_string(),
                    cycle,
                    result,
                    timestamp: Instant::now(),
                })
            })
            .collect();

        let mut sent = 0;
        for report in reports {
            match self.report_tx.try_send(report) {
                Ok(()) => {
                    sent += 1;
                    self.counters.reports_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(report)) | Err(TrySendError::Disconnected(report)) => {
                    self.counters.reports_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "cycle {}: result queue full, dropped report from {}",
                        cycle, report.detector
                    );
                }
            }
        }

        self.cycle_latency.lock().add(start.elapsed());
        sent
    }
}

pub struct Scheduler {
    interval: Duration,
    shared: Arc<Shared>,
    report_rx: Receiver<DetectionReport>,
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler ticking every `interval`, buffering at
    /// most `queue_capacity` reports.
    pub fn new(interval: Duration, queue_capacity: usize) -> Self {
        let (report_tx, report_rx) = bounded(queue_capacity.max(1));

        Self {
            interval,
            shared: Arc::new(Shared {
                detectors: RwLock::new(Vec::new()),
                report_tx,
                counters: Counters::default(),
                cycle_latency: Mutex::new(LatencyStats::with_capacity(CYCLE_LATENCY_WINDOW)),
            }),
            report_rx,
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Add a detector; the returned handle can be used to reconfigure it
    /// between cycles.
    pub fn register(&self, detector: Box<dyn Detector>) -> SharedDetector {
        info!("Registered detector '{}'", detector.name());
        let shared: SharedDetector = Arc::new(Mutex::new(detector));
        self.shared.detectors.write().push(Arc::clone(&shared));
        shared
    }

    pub fn detector_count(&self) -> usize {
        self.shared.detectors.read().len()
    }

    /// Consumer end of the report queue
    pub fn receiver(&self) -> Receiver<DetectionReport> {
        self.report_rx.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle on the calling thread; returns the number of reports queued
    pub fn run_cycle(&self, frame: &RgbaImage) -> usize {
        self.shared.run_cycle(frame)
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Start the capture loop on a background thread
    pub fn start(&self, mut source: Box<dyn FrameSource>) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("detection-scheduler".to_string())
            .spawn(move || {
                info!("Scheduler started ({} ms interval)", interval.as_millis());
                let ticker = tick(interval);

                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => match source.next_frame() {
                            Ok(frame) => {
                                shared.run_cycle(&frame);
                            }
                            Err(e) => {
                                shared.counters.capture_failures.fetch_add(1, Ordering::Relaxed);
                                warn!("Frame capture failed: {}", e);
                            }
                        },
                    }
                }

                info!("Scheduler stopped");
            })
            .map_err(SchedulerError::ThreadSpawnFailed)?;

        *self.stop_tx.lock() = Some(stop_tx);
        *worker = Some(handle);
        Ok(())
    }

    /// Signal the loop and wait for the in-flight cycle to finish
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let handle = self.worker.lock().take().ok_or(SchedulerError::NotRunning)?;

        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(());
        }
        if handle.join().is_err() {
            warn!("Scheduler thread panicked");
        }

        self.shared
            .cycle_latency
            .lock()
            .log_report("detection cycle", self.interval);
        Ok(())
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            cycles: c.cycles.load(Ordering::Relaxed),
            reports_sent: c.reports_sent.load(Ordering::Relaxed),
            reports_dropped: c.reports_dropped.load(Ordering::Relaxed),
            capture_failures: c.capture_failures.load(Ordering::Relaxed),
            skipped_busy: c.skipped_busy.load(Ordering::Relaxed),
        }
    }

    pub fn cycle_latency(&self) -> LatencyStats {
        self.shared.cycle_latency.lock().clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StaticFrameSource;
    use crate::detection::DetectionStrategy;
    use crate::error::CaptureError;
    use crate::vision::Point;
    use image::Rgba;

    /// Reports how many times it has been called
    struct CountingDetector {
        name: &'static str,
        calls: usize,
        enabled: bool,
    }

    impl CountingDetector {
        fn boxed(name: &'static str) -> Box<dyn Detector> {
            Box::new(Self {
                name,
                calls: 0,
                enabled: true,
            })
        }
    }

    impl Detector for CountingDetector {
        fn name(&self) -> &str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn detect(&mut self, _frame: &RgbaImage) -> DetectionResult {
            self.calls += 1;
            DetectionResult::Symbol {
                index: self.calls,
                label: self.name.to_string(),
                location: Point::new(0, 0),
                similarity: 1.0,
                strategy: DetectionStrategy::FullScan,
            }
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
            Err(CaptureError::NoFrames("test".to_string()))
        }
    }

    fn frame() -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_run_cycle_reports_in_registration_order() {
        let scheduler = Scheduler::new(Duration::from_millis(100), 10);
        scheduler.register(CountingDetector::boxed("day"));
        scheduler.register(CountingDetector::boxed("map"));

        assert_eq!(scheduler.run_cycle(&frame()), 2);
        assert_eq!(scheduler.run_cycle(&frame()), 2);

        let rx = scheduler.receiver();
        let names: Vec<(String, u64)> = rx.try_iter().map(|r| (r.detector, r.cycle)).collect();
        assert_eq!(
            names,
            vec![
                ("day".to_string(), 1),
                ("map".to_string(), 1),
                ("day".to_string(), 2),
                ("map".to_string(), 2),
            ]
        );
        assert_eq!(scheduler.stats().cycles, 2);
        assert_eq!(scheduler.cycle_latency().len(), 2);
    }

    #[test]
    fn test_cycle_latency_is_bounded() {
        let scheduler = Scheduler::new(Duration::from_millis(100), 1);
        scheduler.register(CountingDetector::boxed("day"));

        let frame = frame();
        for _ in 0..CYCLE_LATENCY_WINDOW + 25 {
            scheduler.run_cycle(&frame);
        }

        assert_eq!(scheduler.stats().cycles, (CYCLE_LATENCY_WINDOW + 25) as u64);
        assert_eq!(scheduler.cycle_latency().len(), CYCLE_LATENCY_WINDOW);
    }

    #[test]
    fn test_full_queue_drops_reports() {
        let scheduler = Scheduler::new(Duration::from_millis(100), 1);
        scheduler.register(CountingDetector::boxed("a"));
        scheduler.register(CountingDetector::boxed("b"));

        assert_eq!(scheduler.run_cycle(&frame()), 1);

        let stats = scheduler.stats();
        assert_eq!(stats.reports_sent, 1);
        assert_eq!(stats.reports_dropped, 1);
    }

    #[test]
    fn test_busy_detector_is_skipped() {
        let scheduler = Scheduler::new(Duration::from_millis(100), 10);
        let handle = scheduler.register(CountingDetector::boxed("slow"));

        let guard = handle.lock();
        assert_eq!(scheduler.run_cycle(&frame()), 0);
        drop(guard);

        assert_eq!(scheduler.stats().skipped_busy, 1);
        assert_eq!(scheduler.run_cycle(&frame()), 1);
    }

    #[test]
    fn test_disabled_detector_produces_no_report() {
        let scheduler = Scheduler::new(Duration::from_millis(100), 10);
        scheduler.register(Box::new(CountingDetector {
            name: "off",
            calls: 0,
            enabled: false,
        }));

        assert_eq!(scheduler.run_cycle(&frame()), 0);
        assert!(scheduler.receiver().try_recv().is_err());
    }

    #[test]
    fn test_start_and_stop() {
        let scheduler = Scheduler::new(Duration::from_millis(10), 10);
        scheduler.register(CountingDetector::boxed("day"));

        scheduler
            .start(Box::new(StaticFrameSource::new(frame())))
            .unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.start(Box::new(StaticFrameSource::new(frame()))),
            Err(SchedulerError::AlreadyRunning)
        ));

        let report = scheduler
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(report.detector, "day");

        scheduler.stop().unwrap();
        assert!(!scheduler.is_running());
        assert!(matches!(scheduler.stop(), Err(SchedulerError::NotRunning)));
    }

    #[test]
    fn test_capture_failures_are_counted() {
        let scheduler = Scheduler::new(Duration::from_millis(5), 10);
        scheduler.start(Box::new(FailingSource)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while scheduler.stats().capture_failures == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.stop().unwrap();

        let stats = scheduler.stats();
        assert!(stats.capture_failures > 0);
        assert_eq!(stats.cycles, 0);
    }
}
