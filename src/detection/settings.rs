/// Typed detector settings
///
/// The subset of the configuration the cascading detector consumes. The
/// defaults match the configuration defaults so the detector can be used
/// without a config file.
use std::time::Duration;

use super::disambiguation::DisambiguationPolicy;
use super::language::Language;
use super::strategy::DetectionStrategy;

/// Likely overlay positions as `[x, y, w, h]` frame fractions:
/// center, wider center, top center
pub const DEFAULT_PREDEFINED_REGIONS: [[f64; 4]; 3] = [
    [0.35, 0.35, 0.30, 0.30],
    [0.25, 0.25, 0.50, 0.50],
    [0.30, 0.05, 0.40, 0.25],
];

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub language: Language,
    pub match_threshold: f64,
    pub enable_template_matching: bool,
    pub enable_ocr: bool,
    pub strategy: DetectionStrategy,
    /// Hotspot window half-size in pixels
    pub search_radius: u32,
    /// Calls arriving sooner than this return the previous result
    pub min_detect_interval: Duration,
    pub policy: DisambiguationPolicy,
    pub coarse_stride: u32,
    pub pyramid_scales: Vec<f64>,
    pub predefined_regions: Vec<[f64; 4]>,
    pub candidate_bright_ratio: f64,
    pub max_candidates: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            language: Language::English,
            match_threshold: 0.8,
            enable_template_matching: true,
            enable_ocr: false,
            strategy: DetectionStrategy::Auto,
            search_radius: 100,
            min_detect_interval: Duration::ZERO,
            policy: DisambiguationPolicy::default(),
            coarse_stride: 2,
            pyramid_scales: vec![0.25, 0.5, 1.0],
            predefined_regions: DEFAULT_PREDEFINED_REGIONS.to_vec(),
            candidate_bright_ratio: 0.05,
            max_candidates: 16,
        }
    }
}
