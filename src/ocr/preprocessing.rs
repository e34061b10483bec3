/// Image preprocessing for OCR
///
/// Turns an RGBA crop into a binary image with dark text on a white
/// background, which is what Tesseract reads best.
use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use crate::vision::{invert, otsu_threshold, threshold, to_grayscale};

/// Image preprocessor for OCR
///
/// - grayscale conversion
/// - automatic (Otsu) or manual thresholding
/// - optional morphological opening for noise reduction
/// - inversion so the majority (background) ends up white
pub struct ImagePreprocessor {
    manual_threshold: Option<u8>,
    enable_morph_open: bool,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(0, false)
    }
}

impl ImagePreprocessor {
    /// Create a new preprocessor
    ///
    /// # Arguments
    /// * `threshold` - Manual threshold (0 = automatic Otsu thresholding)
    /// * `enable_morph_open` - Enable morphological opening for noise reduction
    pub fn new(threshold: u8, enable_morph_open: bool) -> Self {
        let manual_threshold = if threshold == 0 {
            None
        } else {
            Some(threshold)
        };

        Self {
            manual_threshold,
            enable_morph_open,
        }
    }

    /// Convert an RGBA crop to a binary image ready for OCR
    pub fn preprocess(&self, image: &RgbaImage) -> GrayImage {
        let gray = to_grayscale(image);

        let level = self
            .manual_threshold
            .unwrap_or_else(|| otsu_threshold(&gray));
        let mut binary = threshold(&gray, level);

        if self.enable_morph_open {
            binary = morphological_opening(&binary);
        }

        // Overlay text is bright on a dark background; flip it so the
        // background is white
        let white = binary.as_raw().iter().filter(|&&v| v > 127).count();
        if white * 2 < binary.as_raw().len() {
            binary = invert(&binary);
        }

        binary
    }
}

/// Erosion followed by dilation with a 4-neighborhood cross.
///
/// Removes isolated white specks while keeping strokes; border pixels are
/// cleared.
pub fn morphological_opening(image: &GrayImage) -> GrayImage {
    let eroded = cross_filter(image, |center, neighbors| {
        center && neighbors.iter().all(|&n| n)
    });
    cross_filter(&eroded, |center, neighbors| {
        center || neighbors.iter().any(|&n| n)
    })
}

/// Apply a binary 3x3 cross operator row-parallel
fn cross_filter(image: &GrayImage, op: impl Fn(bool, [bool; 4]) -> bool + Sync) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    if width < 3 || height < 3 {
        return out;
    }

    let w = width as usize;
    let src = image.as_raw();
    let on = |x: usize, y: usize| src[y * w + x] > 127;

    let buffer: &mut [u8] = &mut out;
    buffer
        .par_chunks_mut(w)
        .enumerate()
        .skip(1)
        .take(height as usize - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let neighbors = [on(x, y - 1), on(x, y + 1), on(x - 1, y), on(x + 1, y)];
                row[x] = if op(on(x, y), neighbors) { 255 } else { 0 };
            }
        });

    out
}
