/// Candidate region filter
///
/// Cheap bright-pixel heuristic used to prune the frame before any template
/// matching. Overlay text and icons are drawn near-white, so windows without
/// enough bright pixels are never worth a matching pass.
use image::RgbaImage;

use super::geometry::Rect;

/// Every channel must exceed this for a pixel to count as bright
pub const BRIGHT_CHANNEL_MIN: u8 = 200;

/// Pixel sampling step used while sliding the candidate window
pub const DEFAULT_SAMPLE_STEP: u32 = 4;

/// A window that passed the bright-pixel test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRegion {
    pub rect: Rect,
    pub bright_ratio: f64,
}

/// Fraction of sampled pixels in `region` whose R, G and B all exceed 200.
///
/// The region is clamped to the image; an empty intersection yields 0.0.
pub fn bright_ratio(image: &RgbaImage, region: Rect, sample_step: u32) -> f64 {
    let Some(visible) = region.clamp_to(image.width(), image.height()) else {
        return 0.0;
    };
    let step = sample_step.max(1) as usize;

    let mut sampled = 0usize;
    let mut bright = 0usize;
    for y in (visible.y..visible.bottom()).step_by(step) {
        for x in (visible.x..visible.right()).step_by(step) {
            let px = image.get_pixel(x as u32, y as u32);
            sampled += 1;
            if px[0] > BRIGHT_CHANNEL_MIN && px[1] > BRIGHT_CHANNEL_MIN && px[2] > BRIGHT_CHANNEL_MIN
            {
                bright += 1;
            }
        }
    }

    if sampled == 0 {
        0.0
    } else {
        bright as f64 / sampled as f64
    }
}

/// Whether the bright fraction of `region` reaches `ratio_threshold`
pub fn has_bright_pixels(
    image: &RgbaImage,
    region: Rect,
    ratio_threshold: f64,
    sample_step: u32,
) -> bool {
    let ratio = bright_ratio(image, region, sample_step);
    ratio >= ratio_threshold
}

/// Slide a `window_width` x `window_height` window in `step_size` increments
/// and keep the windows that pass the bright-pixel test, in raster order.
pub fn find_candidate_regions(
    image: &RgbaImage,
    window_width: u32,
    window_height: u32,
    step_size: u32,
    bright_threshold: f64,
) -> Vec<Rect> {
    scan_windows(image, window_width, window_height, step_size, bright_threshold)
        .into_iter()
        .map(|candidate| candidate.rect)
        .collect()
}

/// Like [`find_candidate_regions`], but brightest first and capped at `limit`
pub fn rank_candidate_regions(
    image: &RgbaImage,
    window_width: u32,
    window_height: u32,
    step_size: u32,
    bright_threshold: f64,
    limit: usize,
) -> Vec<CandidateRegion> {
    let mut candidates =
        scan_windows(image, window_width, window_height, step_size, bright_threshold);
    // stable sort keeps raster order among equal ratios
    candidates.sort_by(|a, b| b.bright_ratio.total_cmp(&a.bright_ratio));
    candidates.truncate(limit);
    candidates
}

fn scan_windows(
    image: &RgbaImage,
    window_width: u32,
    window_height: u32,
    step_size: u32,
    bright_threshold: f64,
) -> Vec<CandidateRegion> {
    let (width, height) = image.dimensions();
    if window_width == 0 || window_height == 0 || window_width > width || window_height > height
    {
        return Vec::new();
    }
    let step = step_size.max(1) as usize;

    let mut candidates = Vec::new();
    for y in (0..=height - window_height).step_by(step) {
        for x in (0..=width - window_width).step_by(step) {
            let rect = Rect::new(
                x as i32,
                y as i32,
                window_width as i32,
                window_height as i32,
            );
            let ratio = bright_ratio(image, rect, DEFAULT_SAMPLE_STEP);
            if ratio >= bright_threshold {
                candidates.push(CandidateRegion {
                    rect,
                    bright_ratio: ratio,
                });
            }
        }
    }

    candidates
}
