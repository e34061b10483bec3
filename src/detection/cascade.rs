/// Cascading multi-strategy symbol detector
///
/// Tries strategies from cheapest to most expensive and stops at the first
/// one that produces an unambiguous winner. Every strategy scores all
/// templates of the active set against the same region and hands the scores
/// to the disambiguation policy.
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{GrayImage, RgbaImage};
use tracing::{debug, info};

use super::detector::{DetectionResult, Detector};
use super::disambiguation::Verdict;
use super::language::Language;
use super::settings::DetectorSettings;
use super::stats::DetectionStats;
use super::strategy::DetectionStrategy;
use super::templates::{TemplateLibrary, TemplateSet};
use crate::error::{TemplateError, VisionError};
use crate::ocr::preprocessing::ImagePreprocessor;
use crate::ocr::{recognize_symbol, OcrEngine, UnavailableOcr};
use crate::utils::Throttle;
use crate::vision::{
    crop, rank_candidate_regions, template_match, template_match_pyramid,
    template_match_strided, MatchResult, Point, Rect,
};

/// How each template is searched inside a region
#[derive(Debug, Clone, Copy)]
enum SearchMode {
    Exhaustive,
    Strided,
    Pyramid,
}

/// Winning template of one strategy
#[derive(Debug, Clone, Copy)]
struct Hit {
    index: usize,
    location: Point,
    similarity: f64,
}

fn keep_best(best: Option<Hit>, candidate: Option<Hit>) -> Option<Hit> {
    match (best, candidate) {
        (Some(b), Some(c)) if c.similarity > b.similarity => Some(c),
        (None, c) => c,
        (b, _) => b,
    }
}

pub struct CascadingDetector {
    name: String,
    library: Arc<TemplateLibrary>,
    active: Arc<TemplateSet>,
    settings: DetectorSettings,
    ocr: Box<dyn OcrEngine>,
    preprocessor: ImagePreprocessor,
    hotspot: Option<Point>,
    stats: DetectionStats,
    last_result: DetectionResult,
    throttle: Throttle,
    enabled: bool,
}

impl CascadingDetector {
    /// Create a detector over the library's set for `settings.language`
    pub fn new(
        name: impl Into<String>,
        library: Arc<TemplateLibrary>,
        settings: DetectorSettings,
    ) -> Result<Self, TemplateError> {
        let active = library.get(settings.language)?;
        let name = name.into();
        info!(
            "{}: {} templates ({}), strategy {}",
            name,
            active.len(),
            settings.language,
            settings.strategy
        );

        Ok(Self {
            name,
            library,
            active,
            throttle: Throttle::new(settings.min_detect_interval),
            settings,
            ocr: Box::new(UnavailableOcr),
            preprocessor: ImagePreprocessor::default(),
            hotspot: None,
            stats: DetectionStats::new(),
            last_result: DetectionResult::NotDetected,
            enabled: true,
        })
    }

    /// Use `engine` for the OCR strategy
    pub fn with_ocr(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr = engine;
        self
    }

    pub fn set_strategy(&mut self, strategy: DetectionStrategy) {
        self.settings.strategy = strategy;
    }

    /// Switch the active template set. The hotspot belongs to the old
    /// symbols, so it is dropped.
    pub fn set_language(&mut self, language: Language) -> Result<(), TemplateError> {
        self.active = self.library.get(language)?;
        self.settings.language = language;
        self.hotspot = None;
        Ok(())
    }

    pub fn set_match_threshold(&mut self, threshold: f64) {
        self.settings.match_threshold = threshold;
    }

    pub fn enable_template_matching(&mut self, enabled: bool) {
        self.settings.enable_template_matching = enabled;
    }

    pub fn enable_ocr(&mut self, enabled: bool) {
        self.settings.enable_ocr = enabled;
    }

    pub fn set_search_radius(&mut self, radius: u32) {
        self.settings.search_radius = radius;
    }

    pub fn set_min_interval(&mut self, interval: Duration) {
        self.settings.min_detect_interval = interval;
        self.throttle.set_interval(interval);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Forget the cached location
    pub fn reset_cache(&mut self) {
        self.hotspot = None;
    }

    pub fn hotspot(&self) -> Option<Point> {
        self.hotspot
    }

    pub fn stats(&self) -> DetectionStats {
        self.stats.clone()
    }

    pub fn last_result(&self) -> &DetectionResult {
        &self.last_result
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    fn strategy_enabled(&self, strategy: DetectionStrategy) -> bool {
        match strategy {
            DetectionStrategy::Ocr => self.settings.enable_ocr && self.ocr.is_available(),
            DetectionStrategy::HotspotCache => {
                self.settings.enable_template_matching && self.hotspot.is_some()
            }
            s => s.uses_templates() && self.settings.enable_template_matching,
        }
    }

    fn run_cascade(&mut self, frame: &RgbaImage) -> DetectionResult {
        let gray = crate::vision::to_grayscale(frame);

        for &strategy in self.settings.strategy.plan() {
            if !self.strategy_enabled(strategy) {
                continue;
            }

            self.stats.record_attempt(strategy);
            let Some(hit) = self.run_strategy(strategy, frame, &gray) else {
                debug!("{}: {} found nothing", self.name, strategy);
                continue;
            };

            self.stats.record_hit(strategy);
            self.hotspot = Some(hit.location);
            let label = self
                .active
                .get(hit.index)
                .map(|t| t.label.clone())
                .unwrap_or_default();
            debug!(
                "{}: {} matched {} at ({}, {}) with {:.3}",
                self.name, strategy, label, hit.location.x, hit.location.y, hit.similarity
            );

            return DetectionResult::Symbol {
                index: hit.index,
                label,
                location: hit.location,
                similarity: hit.similarity,
                strategy,
            };
        }

        DetectionResult::NotDetected
    }

    fn run_strategy(
        &mut self,
        strategy: DetectionStrategy,
        frame: &RgbaImage,
        gray: &GrayImage,
    ) -> Option<Hit> {
        let (frame_w, frame_h) = gray.dimensions();
        let (max_w, max_h) = self.active.max_size();

        match strategy {
            DetectionStrategy::HotspotCache => {
                let center = self.hotspot?;
                let window = Rect::around(
                    center,
                    self.settings.search_radius as i32,
                    max_w as i32,
                    max_h as i32,
                );
                self.evaluate_region(gray, window, SearchMode::Exhaustive)
            }
            DetectionStrategy::Predefined => self
                .settings
                .predefined_regions
                .iter()
                .map(|&fractions| Rect::from_fractions(frame_w, frame_h, fractions))
                .fold(None, |best, region| {
                    keep_best(best, self.evaluate_region(gray, region, SearchMode::Strided))
                }),
            DetectionStrategy::ColorFilter => {
                let candidates = rank_candidate_regions(
                    frame,
                    max_w * 2,
                    max_h * 2,
                    (max_w / 2).max(1),
                    self.settings.candidate_bright_ratio,
                    self.settings.max_candidates,
                );
                debug!("{}: {} bright candidate windows", self.name, candidates.len());
                candidates.iter().fold(None, |best, candidate| {
                    keep_best(
                        best,
                        self.evaluate_region(gray, candidate.rect, SearchMode::Exhaustive),
                    )
                })
            }
            DetectionStrategy::Pyramid => {
                self.evaluate_region(gray, Rect::of_size(frame_w, frame_h), SearchMode::Pyramid)
            }
            DetectionStrategy::FullScan => self.evaluate_region(
                gray,
                Rect::of_size(frame_w, frame_h),
                SearchMode::Exhaustive,
            ),
            DetectionStrategy::Ocr => self.read_with_ocr(frame),
            DetectionStrategy::Auto => None,
        }
    }

    /// Score every template inside `region` and let the policy pick a winner
    fn evaluate_region(&self, gray: &GrayImage, region: Rect, mode: SearchMode) -> Option<Hit> {
        let visible = region.clamp_to(gray.width(), gray.height())?;
        let patch = crop(gray, visible);
        let threshold = self.settings.match_threshold;

        let results: Vec<Result<MatchResult, VisionError>> = self
            .active
            .templates()
            .iter()
            .map(|template| match mode {
                SearchMode::Exhaustive => template_match(&patch, &template.gray, threshold),
                SearchMode::Strided => template_match_strided(
                    &patch,
                    &template.gray,
                    threshold,
                    self.settings.coarse_stride,
                ),
                SearchMode::Pyramid => template_match_pyramid(
                    &patch,
                    &template.gray,
                    threshold,
                    &self.settings.pyramid_scales,
                    self.settings.coarse_stride,
                ),
            })
            .collect();

        if results.iter().all(|r| r.is_err()) {
            return None;
        }

        // a template that cannot be evaluated here is simply not viable
        let scores: Vec<f64> = results
            .iter()
            .map(|r| r.as_ref().map_or(0.0, |m| m.similarity))
            .collect();

        match self
            .settings
            .policy
            .decide(&scores, self.active.containment(), threshold)
        {
            Verdict::Winner(index) => {
                let matched = results.get(index)?.as_ref().ok()?;
                Some(Hit {
                    index,
                    location: matched.location.offset(visible.x, visible.y),
                    similarity: matched.similarity,
                })
            }
            Verdict::Ambiguous { best, runner_up } => {
                debug!(
                    "{}: ambiguous region {:?} ({:.3} vs {:.3})",
                    self.name, visible, scores[best], scores[runner_up]
                );
                None
            }
            Verdict::BelowThreshold => None,
        }
    }

    /// Read the symbol with OCR from each predefined region; engine errors
    /// only end this strategy
    fn read_with_ocr(&mut self, frame: &RgbaImage) -> Option<Hit> {
        let (frame_w, frame_h) = frame.dimensions();

        for &fractions in &self.settings.predefined_regions {
            let region = Rect::from_fractions(frame_w, frame_h, fractions);
            let Some(visible) = region.clamp_to(frame_w, frame_h) else {
                continue;
            };
            let patch = crop(frame, visible);

            match recognize_symbol(
                self.ocr.as_mut(),
                &self.preprocessor,
                &patch,
                self.active.len(),
            ) {
                Ok(index) => {
                    return Some(Hit {
                        index,
                        location: visible.origin(),
                        similarity: 1.0,
                    })
                }
                Err(e) => debug!("{}: OCR on {:?} failed: {}", self.name, visible, e),
            }
        }

        None
    }
}

impl Detector for CascadingDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn detect(&mut self, frame: &RgbaImage) -> DetectionResult {
        if !self.enabled {
            return DetectionResult::NotDetected;
        }
        if !self.throttle.ready() {
            debug!("{}: throttled, returning previous result", self.name);
            return self.last_result.clone();
        }

        let start = Instant::now();
        let result = self.run_cascade(frame);
        self.stats.record_call(start.elapsed());

        self.last_result = result.clone();
        result
    }
}
