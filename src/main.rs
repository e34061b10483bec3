use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::RecvTimeoutError;

use overlay_detect::capture::ImageDirSource;
use overlay_detect::config::Config;
use overlay_detect::detection::{
    CascadingDetector, DetectionResult, DetectorSettings, FsAssetProvider, MapRegionDetector,
    TemplateLibrary,
};
use overlay_detect::error::AppResult;
use overlay_detect::ocr;
use overlay_detect::scheduler::Scheduler;

const LOG_TARGET_STARTUP: &str = "overlay_detect::startup";

/// Templates per language: I, II, III
const SYMBOL_COUNT: usize = 3;

/// Initialize tracing with file rotation
///
/// Logs go to `<config dir>/OverlayDetect/logs/overlay-detect.YYYY-MM-DD.log`
/// (`./logs` when the platform has no config directory). Debug builds also
/// log to the console.
fn initialize_tracing(default_level: &str) {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("OverlayDetect").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "overlay-detect.log");

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn load_config() -> AppResult<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))
            .with_context(|| format!("Failed to load config file {}", path)),
        None => Config::load_or_default().context("Failed to load default config"),
    }
}

fn describe(result: &DetectionResult) -> String {
    match result {
        DetectionResult::Symbol {
            label,
            location,
            similarity,
            strategy,
            ..
        } => format!(
            "{} at ({}, {}) similarity {:.3} via {}",
            label, location.x, location.y, similarity, strategy
        ),
        DetectionResult::Region { rect, verified, .. } => format!(
            "region x={} y={} w={} h={}{}",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            if *verified { "" } else { " (fallback)" }
        ),
        DetectionResult::NotDetected => "not detected".to_string(),
    }
}

fn run() -> AppResult<()> {
    let cfg = load_config()?;
    initialize_tracing(&cfg.log_level);

    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Starting overlay-detect v{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );
    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Language: {}, strategy: {}, threshold: {:.2}, interval: {} ms",
        cfg.language,
        cfg.strategy,
        cfg.match_threshold,
        cfg.capture_interval_ms
    );

    let provider = FsAssetProvider::new(&cfg.template_dir);
    let library = TemplateLibrary::load(&provider, &[cfg.language], SYMBOL_COUNT)
        .with_context(|| format!("Failed to load templates from {}", cfg.template_dir))?;

    let settings = DetectorSettings::from(&cfg);
    let day_detector = CascadingDetector::new("day", Arc::new(library), settings)
        .context("Failed to create symbol detector")?
        .with_ocr(ocr::create_engine(cfg.enable_ocr));

    let source = ImageDirSource::new(&cfg.frame_dir)
        .with_context(|| format!("Failed to open frame directory {}", cfg.frame_dir))?;

    let scheduler = Scheduler::new(cfg.capture_interval(), cfg.result_queue_capacity);
    scheduler.register(Box::new(day_detector));
    scheduler.register(Box::new(MapRegionDetector::new("map")));
    scheduler
        .start(Box::new(source))
        .context("Failed to start scheduler")?;

    let deadline = (cfg.run_seconds > 0).then(|| Instant::now() + Duration::from_secs(cfg.run_seconds));
    let reports = scheduler.receiver();
    let mut last: HashMap<String, DetectionResult> = HashMap::new();

    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                deadline - now
            }
            None => Duration::from_secs(3600),
        };

        match reports.recv_timeout(wait) {
            Ok(report) => {
                if last.get(&report.detector) != Some(&report.result) {
                    tracing::info!("[{}] {}", report.detector, describe(&report.result));
                    last.insert(report.detector, report.result);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    scheduler.stop().context("Failed to stop scheduler")?;

    let stats = scheduler.stats();
    tracing::info!(
        "Ran {} cycles: {} reports, {} dropped, {} capture failures",
        stats.cycles,
        stats.reports_sent,
        stats.reports_dropped,
        stats.capture_failures
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        tracing::error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
