use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detection::{
    DetectionStrategy, DetectorSettings, DisambiguationPolicy, Language, DEFAULT_PREDEFINED_REGIONS,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template set to match against
    pub language: Language,

    /// Minimum similarity for a template match (0-1]
    pub match_threshold: f64,

    pub enable_template_matching: bool,

    /// Use OCR as the last resort (needs the `tesseract` feature)
    pub enable_ocr: bool,

    pub strategy: DetectionStrategy,

    /// Hotspot search window half-size in pixels
    pub search_radius: u32,

    /// Detector calls closer together than this return the previous result
    pub min_detect_interval_ms: u64,

    /// Scheduler tick period
    pub capture_interval_ms: u64,

    /// Required lead of the winner over the runner-up
    pub min_confidence_gap: f64,

    /// Required lead of a contained symbol ("I" inside "II") over longer ones
    pub superset_lead: f64,

    pub coarse_stride: u32,

    pub pyramid_scales: Vec<f64>,

    /// Likely overlay positions as `[x, y, w, h]` frame fractions
    pub predefined_regions: Vec<[f64; 4]>,

    pub candidate_bright_ratio: f64,

    pub max_candidates: usize,

    /// Reports buffered between the scheduler and its consumer
    pub result_queue_capacity: usize,

    /// Directory holding `<code>_<n>.png` template images
    pub template_dir: String,

    /// Directory of frames replayed by the offline frame source
    pub frame_dir: String,

    /// Default filter when RUST_LOG is unset
    pub log_level: String,

    /// Stop after this many seconds (0 = run until killed)
    pub run_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: Language::English,
            match_threshold: 0.8,
            enable_template_matching: true,
            enable_ocr: false,
            strategy: DetectionStrategy::Auto,
            search_radius: 100,
            min_detect_interval_ms: 0,
            capture_interval_ms: 1000,
            min_confidence_gap: 0.02,
            superset_lead: 0.05,
            coarse_stride: 2,
            pyramid_scales: vec![0.25, 0.5, 1.0],
            predefined_regions: DEFAULT_PREDEFINED_REGIONS.to_vec(),
            candidate_bright_ratio: 0.05,
            max_candidates: 16,
            result_queue_capacity: 100,
            template_dir: "templates".to_string(),
            frame_dir: "frames".to_string(),
            log_level: "info".to_string(),
            run_seconds: 0,
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source,
        };

        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let config: Config = serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;

        Ok(())
    }

    /// Load the config next to the executable, creating it with defaults
    /// when it doesn't exist yet.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Config::default();
            config.save(&path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// `<exe dir>/config/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "<current executable>".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("could not determine executable directory".into()))?;

        Ok(exe_dir.join("config").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "match_threshold must be in (0, 1], got {}",
                self.match_threshold
            )));
        }
        if self.coarse_stride == 0 {
            return Err(ConfigError::Invalid("coarse_stride must be at least 1".into()));
        }
        if self.pyramid_scales.is_empty()
            || self.pyramid_scales.iter().any(|&s| !s.is_finite() || s <= 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "pyramid_scales must be a non-empty list of positive factors, got {:?}",
                self.pyramid_scales
            )));
        }
        if let Some(region) = self
            .predefined_regions
            .iter()
            .find(|r| r[2] <= 0.0 || r[3] <= 0.0 || r.iter().any(|&f| !f.is_finite() || f < 0.0))
        {
            return Err(ConfigError::Invalid(format!(
                "predefined region {:?} must have positive size",
                region
            )));
        }
        if self.min_confidence_gap < 0.0 || self.superset_lead < 0.0 {
            return Err(ConfigError::Invalid("disambiguation margins must not be negative".into()));
        }
        if self.result_queue_capacity == 0 {
            return Err(ConfigError::Invalid("result_queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }
}

impl From<&Config> for DetectorSettings {
    fn from(config: &Config) -> Self {
        Self {
            language: config.language,
            match_threshold: config.match_threshold,
            enable_template_matching: config.enable_template_matching,
            enable_ocr: config.enable_ocr,
            strategy: config.strategy,
            search_radius: config.search_radius,
            min_detect_interval: Duration::from_millis(config.min_detect_interval_ms),
            policy: DisambiguationPolicy {
                min_confidence_gap: config.min_confidence_gap,
                superset_lead: config.superset_lead,
            },
            coarse_stride: config.coarse_stride,
            pyramid_scales: config.pyramid_scales.clone(),
            predefined_regions: config.predefined_regions.clone(),
            candidate_bright_ratio: config.candidate_bright_ratio,
            max_candidates: config.max_candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.match_threshold, 0.8);
        assert_eq!(config.capture_interval(), Duration::from_secs(1));
        assert_eq!(config.result_queue_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_detector_settings() {
        let settings = DetectorSettings::from(&Config::default());
        assert_eq!(settings, DetectorSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"language": "Japanese", "strategy": "OCR"}"#).unwrap();
        assert_eq!(config.language, Language::Japanese);
        assert_eq!(config.strategy, DetectionStrategy::Ocr);
        assert_eq!(config.coarse_stride, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.match_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.coarse_stride = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pyramid_scales = vec![0.5, -1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pyramid_scales = vec![0.5, f64::NAN, 1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pyramid_scales = vec![f64::INFINITY];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.predefined_regions = vec![[0.1, 0.1, 0.0, 0.2]];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.predefined_regions = vec![[f64::NAN, 0.1, 0.2, 0.2]];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.result_queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = env::temp_dir().join(format!("overlay-detect-config-{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.language = Language::TraditionalChinese;
        config.min_detect_interval_ms = 250;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load(Path::new("/nonexistent/overlay-detect.json")).unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed { .. }));
    }
}
