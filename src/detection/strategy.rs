/// Detection strategies, ordered by expected cost
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetectionStrategy {
    /// Try every concrete strategy in [`DetectionStrategy::AUTO_ORDER`]
    #[default]
    Auto,
    HotspotCache,
    ColorFilter,
    Pyramid,
    Predefined,
    FullScan,
    #[serde(rename = "OCR")]
    Ocr,
}

impl DetectionStrategy {
    /// Cheapest first; the first strategy that produces a winner ends the cascade
    pub const AUTO_ORDER: [DetectionStrategy; 6] = [
        DetectionStrategy::HotspotCache,
        DetectionStrategy::Predefined,
        DetectionStrategy::ColorFilter,
        DetectionStrategy::Pyramid,
        DetectionStrategy::FullScan,
        DetectionStrategy::Ocr,
    ];

    /// Strategies a detection call walks through
    pub fn plan(self) -> &'static [DetectionStrategy] {
        match self {
            DetectionStrategy::Auto => &Self::AUTO_ORDER,
            DetectionStrategy::HotspotCache => &[DetectionStrategy::HotspotCache],
            DetectionStrategy::ColorFilter => &[DetectionStrategy::ColorFilter],
            DetectionStrategy::Pyramid => &[DetectionStrategy::Pyramid],
            DetectionStrategy::Predefined => &[DetectionStrategy::Predefined],
            DetectionStrategy::FullScan => &[DetectionStrategy::FullScan],
            DetectionStrategy::Ocr => &[DetectionStrategy::Ocr],
        }
    }

    /// Whether the strategy scores templates (as opposed to reading text)
    pub fn uses_templates(self) -> bool {
        !matches!(self, DetectionStrategy::Auto | DetectionStrategy::Ocr)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DetectionStrategy::Auto => "Auto",
            DetectionStrategy::HotspotCache => "HotspotCache",
            DetectionStrategy::ColorFilter => "ColorFilter",
            DetectionStrategy::Pyramid => "Pyramid",
            DetectionStrategy::Predefined => "Predefined",
            DetectionStrategy::FullScan => "FullScan",
            DetectionStrategy::Ocr => "OCR",
        }
    }
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_plan_order() {
        let plan = DetectionStrategy::Auto.plan();
        assert_eq!(plan.first(), Some(&DetectionStrategy::HotspotCache));
        assert_eq!(plan.last(), Some(&DetectionStrategy::Ocr));
        assert!(!plan.contains(&DetectionStrategy::Auto));
    }

    #[test]
    fn test_single_strategy_plan() {
        assert_eq!(
            DetectionStrategy::FullScan.plan(),
            &[DetectionStrategy::FullScan]
        );
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&DetectionStrategy::Ocr).unwrap();
        assert_eq!(json, "\"OCR\"");
        let parsed: DetectionStrategy = serde_json::from_str("\"Pyramid\"").unwrap();
        assert_eq!(parsed, DetectionStrategy::Pyramid);
    }
}
