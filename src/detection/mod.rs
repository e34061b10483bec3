/// Detection module
///
/// Detectors that turn a captured frame into a typed result.
///
/// ## Architecture
///
/// ```text
/// Scheduler (one pass per tick)
///   ├── CascadingDetector (symbol: day counter, ...)
///   │     HotspotCache → Predefined → ColorFilter → Pyramid → FullScan → OCR
///   │     └── DisambiguationPolicy (confidence gap + superset lead)
///   └── MapRegionDetector (minimap circle → map overlay region)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use overlay_detect::detection::{CascadingDetector, Detector, DetectorSettings};
///
/// let mut detector = CascadingDetector::new("day", library, DetectorSettings::default())?;
/// match detector.detect(&frame) {
///     DetectionResult::Symbol { index, location, .. } => {
///         println!("Day {} at {:?}", index + 1, location);
///     }
///     _ => {}
/// }
/// ```
pub mod cascade;
pub mod detector;
pub mod disambiguation;
pub mod language;
pub mod map_region;
pub mod settings;
pub mod stats;
pub mod strategy;
pub mod templates;

// Re-export commonly used types
pub use cascade::CascadingDetector;
pub use detector::{DetectionResult, Detector};
pub use disambiguation::{DisambiguationPolicy, Verdict};
pub use language::Language;
pub use map_region::MapRegionDetector;
pub use settings::{DetectorSettings, DEFAULT_PREDEFINED_REGIONS};
pub use stats::DetectionStats;
pub use strategy::DetectionStrategy;
pub use templates::{
    template_file_name, AssetProvider, FsAssetProvider, Template, TemplateLibrary, TemplateSet,
};
