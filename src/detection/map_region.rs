/// Map overlay region detector
///
/// Locates the minimap circle, derives the full map region from it and
/// keeps the last verified region so that a missed frame still yields a
/// usable region. It never fails: the worst case is the fixed fallback.
use image::RgbaImage;
use tracing::{debug, info, warn};

use super::detector::{DetectionResult, Detector};
use crate::vision::{
    crop, fallback_map_region, find_minimap_circle, map_region_from_minimap, preset_regions,
    verify_region, Circle, Rect,
};

pub struct MapRegionDetector {
    name: String,
    use_presets: bool,
    last_region: Option<Rect>,
    last_minimap: Option<Circle>,
    enabled: bool,
}

impl Default for MapRegionDetector {
    fn default() -> Self {
        Self::new("map")
    }
}

impl MapRegionDetector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            use_presets: false,
            last_region: None,
            last_minimap: None,
            enabled: true,
        }
    }

    /// Try the resolution presets before auto-detection on every call
    pub fn with_presets(mut self, use_presets: bool) -> Self {
        self.use_presets = use_presets;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_region(&self) -> Option<Rect> {
        self.last_region
    }

    pub fn last_minimap(&self) -> Option<Circle> {
        self.last_minimap
    }

    /// Find the map region; the flag is false when a fallback was used
    pub fn detect_region(&mut self, frame: &RgbaImage) -> (Rect, bool) {
        let (width, height) = frame.dimensions();
        debug!("{}: detecting map region in {}x{} frame", self.name, width, height);

        let Some(minimap) = find_minimap_circle(frame) else {
            info!("{}: no minimap detected, using fallback region", self.name);
            return (self.fallback(width, height), false);
        };
        debug!(
            "{}: minimap at ({}, {}) r={} score={:.3}",
            self.name, minimap.x, minimap.y, minimap.radius, minimap.score
        );

        let region = map_region_from_minimap(width, height, Some(&minimap));
        if !verify_region(frame, region) {
            warn!("{}: region {:?} failed verification, using fallback", self.name, region);
            return (self.fallback(width, height), false);
        }

        self.last_region = Some(region);
        self.last_minimap = Some(minimap);
        (region, true)
    }

    /// Accept the first preset that passes verification, else auto-detect
    pub fn detect_with_presets(&mut self, frame: &RgbaImage, presets: &[Rect]) -> (Rect, bool) {
        if let Some(&preset) = presets.iter().find(|&&p| verify_region(frame, p)) {
            debug!("{}: using preset region {:?}", self.name, preset);
            self.last_region = Some(preset);
            // a preset says nothing about where the minimap is
            self.last_minimap = None;
            return (preset, true);
        }

        debug!("{}: presets rejected, trying auto-detection", self.name);
        self.detect_region(frame)
    }

    /// Crop the detected (or fallback) map region out of the frame
    pub fn extract_region(&mut self, frame: &RgbaImage) -> (RgbaImage, bool) {
        let (region, verified) = self.detect_region(frame);
        if !verified {
            debug!("{}: extracting unverified region {:?}", self.name, region);
        }
        (crop(frame, region), verified)
    }

    /// Cached region first, then the fixed centered fallback
    fn fallback(&self, width: u32, height: u32) -> Rect {
        self.last_region
            .unwrap_or_else(|| fallback_map_region(width, height))
    }
}

impl Detector for MapRegionDetector {
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

        let (rect, verified) = if self.use_presets {
            let presets = preset_regions(frame.width(), frame.height());
            self.detect_with_presets(frame, &presets)
        } else {
            self.detect_region(frame)
        };

        DetectionResult::Region {
            rect,
            minimap: if verified { self.last_minimap } else { None },
            verified,
        }
    }
}
