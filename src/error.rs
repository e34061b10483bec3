use thiserror::Error;

use crate::detection::Language;
use crate::vision::Rect;

/// Library-level errors using thiserror for structured error handling.
///
/// Vision and template errors are local preconditions: strategies catch them
/// and treat the candidate as not viable. Only the binary chains them with
/// anyhow.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("Image dimensions differ: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },

    #[error("Image has zero pixels")]
    EmptyImage,

    #[error("Invalid region: {0:?}")]
    InvalidRegion(Rect),

    #[error("Template {template:?} is larger than source {source_size:?}")]
    TemplateTooLarge {
        template: (u32, u32),
        source_size: (u32, u32),
    },

    #[error("Stride must be at least 1")]
    InvalidStride,

    #[error("Invalid pyramid scales: {0:?}")]
    InvalidScales(Vec<f64>),
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load template image: {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Template set for {0} is empty")]
    EmptySet(Language),

    #[error("No templates loaded for {0}")]
    MissingLanguage(Language),

    #[error("Superset index {index} out of range or repeated for a set of {len}")]
    InvalidSuperset { index: usize, len: usize },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR support is not available in this build")]
    Unavailable,

    #[error("Failed to initialize OCR engine")]
    InitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to perform OCR on image")]
    RecognitionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Unrecognized text: '{0}'")]
    Unrecognized(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No frames found in {0}")]
    NoFrames(String),

    #[error("Failed to load frame: {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Failed to start detection thread")]
    ThreadSpawnFailed(#[source] std::io::Error),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
