/// Tesseract OCR engine
///
/// Reads single-line roman numerals from preprocessed binary crops.
use std::io::Cursor;

use image::{GrayImage, ImageFormat};
use leptess::{LepTess, Variable};

use super::OcrEngine;
use crate::error::OcrError;

/// Characters the day counter can contain
const WHITELIST: &str = "IVX ";

/// PSM 7 = treat the image as a single text line
const PAGE_SEG_MODE_SINGLE_LINE: &str = "7";

pub struct TesseractOcr {
    tess: LepTess,
}

impl TesseractOcr {
    /// Initialize Tesseract with the English model and the numeral whitelist.
    ///
    /// Respects `TESSDATA_PREFIX`; otherwise the system data path is used.
    pub fn new() -> Result<Self, OcrError> {
        tracing::info!("Initializing Tesseract OCR...");

        let datapath = std::env::var("TESSDATA_PREFIX").ok();
        let mut tess = LepTess::new(datapath.as_deref(), "eng")
            .map_err(|e| OcrError::InitFailed(Box::new(e)))?;

        tess.set_variable(Variable::TesseditPagesegMode, PAGE_SEG_MODE_SINGLE_LINE)
            .map_err(|e| OcrError::InitFailed(Box::new(e)))?;
        tess.set_variable(Variable::TesseditCharWhitelist, WHITELIST)
            .map_err(|e| OcrError::InitFailed(Box::new(e)))?;

        tracing::info!("Tesseract OCR initialized (single line, whitelist '{}')", WHITELIST);
        Ok(Self { tess })
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&mut self, binary: &GrayImage) -> Result<String, OcrError> {
        let mut png = Cursor::new(Vec::new());
        binary
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| OcrError::RecognitionFailed(Box::new(e)))?;

        self.tess
            .set_image_from_mem(png.get_ref())
            .map_err(|e| OcrError::RecognitionFailed(Box::new(e)))?;
        let text = self
            .tess
            .get_utf8_text()
            .map_err(|e| OcrError::RecognitionFailed(Box::new(e)))?;

        let text = text.trim().to_uppercase();
        if !text.is_empty() {
            tracing::debug!("OCR read '{}'", text);
        }
        Ok(text)
    }
}
