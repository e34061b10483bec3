/// Detector trait and common types
///
/// Defines the interface the scheduler drives once per capture cycle.
use image::RgbaImage;

use super::strategy::DetectionStrategy;
use crate::vision::{Circle, Point, Rect};

/// Detection result from a detector
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetectionResult {
    /// A template set member won
    Symbol {
        /// Index into the active template set
        index: usize,
        label: String,
        /// Top-left of the matched template in frame coordinates
        location: Point,
        similarity: f64,
        strategy: DetectionStrategy,
    },
    /// A dependent region was located (map overlay)
    Region {
        rect: Rect,
        minimap: Option<Circle>,
        /// False when the region is a cached or fixed fallback
        verified: bool,
    },
    /// Nothing cleared the thresholds; normal operation, not an error
    #[default]
    NotDetected,
}

impl DetectionResult {
    pub fn is_detected(&self) -> bool {
        !matches!(self, DetectionResult::NotDetected)
    }

    /// Symbol index, if a symbol was detected
    pub fn symbol_index(&self) -> Option<usize> {
        match self {
            DetectionResult::Symbol { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Detector trait
///
/// Each instance owns its private state (cache, counters). `detect` takes
/// `&mut self`, so overlapping calls on one instance are prevented by the
/// caller's lock rather than inside the detector.
pub trait Detector: Send {
    /// Get detector name (for logging)
    fn name(&self) -> &str;

    /// Check if detector is enabled
    fn is_enabled(&self) -> bool {
        true
    }

    /// Run one detection pass over a captured frame
    fn detect(&mut self, frame: &RgbaImage) -> DetectionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_helpers() {
        let symbol = DetectionResult::Symbol {
            index: 2,
            label: "eng_3".to_string(),
            location: Point::new(4, 5),
            similarity: 0.97,
            strategy: DetectionStrategy::FullScan,
        };
        assert!(symbol.is_detected());
        assert_eq!(symbol.symbol_index(), Some(2));

        assert!(!DetectionResult::NotDetected.is_detected());
        assert_eq!(DetectionResult::default(), DetectionResult::NotDetected);

        let region = DetectionResult::Region {
            rect: Rect::new(0, 0, 10, 10),
            minimap: None,
            verified: false,
        };
        assert!(region.is_detected());
        assert_eq!(region.symbol_index(), None);
    }
}
