//! Overlay detection for game screen captures.
//!
//! Finds which member of a small visual template set (a day counter drawn
//! as I / II / III) is on screen, and where the map overlay sits relative to
//! the minimap. Detectors are driven periodically by [`scheduler::Scheduler`].
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod ocr;
pub mod scheduler;
pub mod utils;
pub mod vision;

pub use config::Config;
pub use detection::{CascadingDetector, DetectionResult, Detector, MapRegionDetector};
pub use scheduler::{DetectionReport, Scheduler};
