/// OCR leaf strategy
///
/// Text recognition is an optional capability behind the `OcrEngine` trait:
/// builds with the `tesseract` feature get a real engine, every other build
/// uses `UnavailableOcr`, which always fails and makes the cascading detector
/// fall through to its next strategy.
///
/// # Architecture
///
/// - `preprocessing`: binarization (Otsu) and inversion to dark-on-white
/// - `detection`: Tesseract integration (feature `tesseract`)
/// - `text_extraction`: mapping recognized text to symbol values
#[cfg(feature = "tesseract")]
mod detection;
pub mod preprocessing;
pub mod text_extraction;

#[cfg(feature = "tesseract")]
pub use detection::TesseractOcr;

use image::{GrayImage, RgbaImage};
use preprocessing::ImagePreprocessor;

use crate::error::OcrError;

/// Text recognition capability
pub trait OcrEngine: Send {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Recognize text in a preprocessed binary image (dark text on white)
    fn recognize(&mut self, binary: &GrayImage) -> Result<String, OcrError>;
}

/// Stand-in engine for builds without OCR support
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&mut self, _binary: &GrayImage) -> Result<String, OcrError> {
        Err(OcrError::Unavailable)
    }
}

/// Pick the OCR engine for this build.
///
/// Falls back to `UnavailableOcr` when OCR is disabled, not compiled in, or
/// fails to initialize.
pub fn create_engine(enable: bool) -> Box<dyn OcrEngine> {
    if !enable {
        return Box::new(UnavailableOcr);
    }

    #[cfg(feature = "tesseract")]
    {
        match TesseractOcr::new() {
            Ok(engine) => return Box::new(engine),
            Err(e) => tracing::warn!("OCR disabled: {}", e),
        }
    }

    #[cfg(not(feature = "tesseract"))]
    tracing::warn!("OCR requested but this build has no OCR support");

    Box::new(UnavailableOcr)
}

/// Read a roman numeral from an RGBA crop and map it to a 0-based symbol index.
///
/// Values outside `1..=symbol_count` are reported as unrecognized.
pub fn recognize_symbol(
    engine: &mut dyn OcrEngine,
    preprocessor: &ImagePreprocessor,
    image: &RgbaImage,
    symbol_count: usize,
) -> Result<usize, OcrError> {
    let binary = preprocessor.preprocess(image);
    let text = engine.recognize(&binary)?;

    match text_extraction::parse_roman(&text) {
        Some(value) if (1..=symbol_count).contains(&value) => Ok(value - 1),
        _ => Err(OcrError::Unrecognized(text)),
    }
}
