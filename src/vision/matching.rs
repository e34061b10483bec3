/// Similarity scoring and template matching
///
/// Scores are `1 - MSE / 65025` over gray levels, so 1.0 means pixel-identical
/// and 0.0 means every pixel differs by the full 255. All search variants
/// parallelize over candidate rows with rayon and break ties toward the
/// smallest `(y, x)` so results are deterministic.
use image::GrayImage;
use rayon::prelude::*;
use tracing::debug;

use super::geometry::{Point, Rect};
use super::primitives::{crop, scale};
use crate::error::VisionError;

/// Largest possible squared difference between two gray levels
const MAX_SQUARED_ERROR: f64 = 65025.0;

/// Coarse hits at or above `threshold * COARSE_RELAXATION` get refined
pub const COARSE_RELAXATION: f64 = 0.9;

/// Threshold factor applied on every pyramid level except the finest
pub const PYRAMID_RELAXATION: f64 = 0.85;

/// Best location of a template inside a source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub location: Point,
    pub similarity: f64,
    pub found: bool,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self {
            location: Point::default(),
            similarity: 0.0,
            found: false,
        }
    }

    fn scored(location: Point, similarity: f64, threshold: f64) -> Self {
        Self {
            location,
            similarity,
            found: similarity >= threshold,
        }
    }
}

/// Similarity of two equally sized gray images
pub fn similarity(a: &GrayImage, b: &GrayImage) -> Result<f64, VisionError> {
    if a.dimensions() != b.dimensions() {
        return Err(VisionError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    if a.as_raw().is_empty() {
        return Err(VisionError::EmptyImage);
    }

    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| {
            let d = p as i64 - q as i64;
            (d * d) as u64
        })
        .sum();

    Ok(normalize(sum, a.as_raw().len()))
}

#[inline]
fn normalize(squared_error: u64, pixels: usize) -> f64 {
    let mse = squared_error as f64 / pixels as f64;
    1.0 - mse / MAX_SQUARED_ERROR
}

/// Inclusive range of template top-left positions to evaluate
#[derive(Debug, Clone, Copy)]
struct SearchWindow {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl SearchWindow {
    fn full(source: &GrayImage, template: &GrayImage) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: source.width() - template.width(),
            y1: source.height() - template.height(),
        }
    }

    /// `center ± margin`, clamped inside `bounds`
    fn around(center: Point, margin: i32, bounds: &SearchWindow) -> Self {
        let clamp_x = |v: i32| v.clamp(bounds.x0 as i32, bounds.x1 as i32) as u32;
        let clamp_y = |v: i32| v.clamp(bounds.y0 as i32, bounds.y1 as i32) as u32;
        Self {
            x0: clamp_x(center.x - margin),
            y0: clamp_y(center.y - margin),
            x1: clamp_x(center.x + margin),
            y1: clamp_y(center.y + margin),
        }
    }
}

/// Score the template with its top-left corner at `(x, y)`
#[inline]
fn window_score(source: &GrayImage, template: &GrayImage, x: u32, y: u32) -> f64 {
    let src = source.as_raw();
    let tpl = template.as_raw();
    let sw = source.width() as usize;
    let tw = template.width() as usize;
    let (x, y) = (x as usize, y as usize);

    let mut sum = 0u64;
    for (ty, tpl_row) in tpl.chunks_exact(tw).enumerate() {
        let start = (y + ty) * sw + x;
        let src_row = &src[start..start + tw];
        for (&p, &q) in src_row.iter().zip(tpl_row) {
            let d = p as i32 - q as i32;
            sum += (d * d) as u64;
        }
    }

    normalize(sum, tpl.len())
}

/// Higher similarity wins; ties go to the smaller `(y, x)`
fn better(a: (Point, f64), b: (Point, f64)) -> (Point, f64) {
    if b.1 > a.1 || (b.1 == a.1 && (b.0.y, b.0.x) < (a.0.y, a.0.x)) {
        b
    } else {
        a
    }
}

/// Evaluate every `step`-th position of a window, rows in parallel
fn best_in_window(
    source: &GrayImage,
    template: &GrayImage,
    window: SearchWindow,
    step: u32,
) -> (Point, f64) {
    let step = step.max(1) as usize;
    let rows: Vec<u32> = (window.y0..=window.y1).step_by(step).collect();

    rows.par_iter()
        .map(|&y| {
            (window.x0..=window.x1)
                .step_by(step)
                .map(|x| (Point::new(x as i32, y as i32), window_score(source, template, x, y)))
                .fold((Point::default(), f64::MIN), better)
        })
        .reduce(|| (Point::default(), f64::MIN), better)
}

/// Coarse grid at `stride`, refined at full resolution around a promising hit
fn strided_search(
    source: &GrayImage,
    template: &GrayImage,
    window: SearchWindow,
    threshold: f64,
    stride: u32,
) -> (Point, f64) {
    let coarse = best_in_window(source, template, window, stride);
    if stride == 1 || coarse.1 < threshold * COARSE_RELAXATION {
        return coarse;
    }

    let refine = SearchWindow::around(coarse.0, stride as i32, &window);
    better(coarse, best_in_window(source, template, refine, 1))
}

fn check_fits(source: &GrayImage, template: &GrayImage) -> Result<(), VisionError> {
    if source.as_raw().is_empty() || template.as_raw().is_empty() {
        return Err(VisionError::EmptyImage);
    }
    if template.width() > source.width() || template.height() > source.height() {
        return Err(VisionError::TemplateTooLarge {
            template: template.dimensions(),
            source_size: source.dimensions(),
        });
    }
    Ok(())
}

/// Exhaustive sliding-window search
pub fn template_match(
    source: &GrayImage,
    template: &GrayImage,
    threshold: f64,
) -> Result<MatchResult, VisionError> {
    check_fits(source, template)?;

    let (location, score) =
        best_in_window(source, template, SearchWindow::full(source, template), 1);
    Ok(MatchResult::scored(location, score, threshold))
}

/// Two-phase search: every `stride`-th position first, then a `±stride`
/// full-resolution refinement when the coarse best reaches `0.9 * threshold`
pub fn template_match_strided(
    source: &GrayImage,
    template: &GrayImage,
    threshold: f64,
    stride: u32,
) -> Result<MatchResult, VisionError> {
    if stride == 0 {
        return Err(VisionError::InvalidStride);
    }
    check_fits(source, template)?;

    let (location, score) = strided_search(
        source,
        template,
        SearchWindow::full(source, template),
        threshold,
        stride,
    );
    Ok(MatchResult::scored(location, score, threshold))
}

/// Multi-scale search, coarsest scale first.
///
/// Every level but the last uses `threshold * 0.85`; a level that misses ends
/// the search. Finer levels only search a small window around the previous
/// winner. The returned location is in full-resolution coordinates.
pub fn template_match_pyramid(
    source: &GrayImage,
    template: &GrayImage,
    threshold: f64,
    scales: &[f64],
    stride: u32,
) -> Result<MatchResult, VisionError> {
    if stride == 0 {
        return Err(VisionError::InvalidStride);
    }
    if scales.is_empty() || scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(VisionError::InvalidScales(scales.to_vec()));
    }
    check_fits(source, template)?;

    let mut levels = scales.to_vec();
    levels.sort_by(|a, b| a.total_cmp(b));

    // (full-resolution location, scale it was found at)
    let mut previous: Option<(Point, f64)> = None;
    let mut result = MatchResult::not_found();

    for (i, &level) in levels.iter().enumerate() {
        let last = i + 1 == levels.len();
        let level_threshold = if last {
            threshold
        } else {
            threshold * PYRAMID_RELAXATION
        };

        let (scaled_source, scaled_template);
        let (src, tpl) = if level == 1.0 {
            (source, template)
        } else {
            scaled_source = scale(source, level);
            scaled_template = scale(template, level);
            (&scaled_source, &scaled_template)
        };

        if check_fits(src, tpl).is_err() {
            if last {
                return Ok(result);
            }
            debug!("Skipping pyramid level {:.2}: template does not fit", level);
            continue;
        }

        let full = SearchWindow::full(src, tpl);
        let window = match previous {
            Some((location, previous_level)) => {
                let center = Point::new(
                    (location.x as f64 * level).round() as i32,
                    (location.y as f64 * level).round() as i32,
                );
                let margin = (2.0 * level / previous_level).ceil() as i32 + stride as i32;
                SearchWindow::around(center, margin, &full)
            }
            None => full,
        };

        let (location, score) = strided_search(src, tpl, window, level_threshold, stride);
        let full_location = Point::new(
            (location.x as f64 / level).round() as i32,
            (location.y as f64 / level).round() as i32,
        );
        result = MatchResult::scored(full_location, score, threshold);

        if score < level_threshold {
            debug!(
                "Pyramid level {:.2} rejected (score {:.3} < {:.3})",
                level, score, level_threshold
            );
            result.found = false;
            return Ok(result);
        }
        previous = Some((full_location, level));
    }

    Ok(result)
}

/// Match independently inside each region and keep the global best.
///
/// Regions are clamped to the source; regions that cannot hold the template
/// are skipped. Locations are returned in source coordinates.
pub fn template_match_multiple(
    source: &GrayImage,
    template: &GrayImage,
    regions: &[Rect],
    threshold: f64,
) -> MatchResult {
    let mut best: Option<MatchResult> = None;

    for region in regions {
        let Some(visible) = region.clamp_to(source.width(), source.height()) else {
            debug!("Region {:?} lies outside the frame", region);
            continue;
        };
        let patch = crop(source, visible);
        let local = match template_match(&patch, template, threshold) {
            Ok(local) => local,
            Err(e) => {
                debug!("Region {:?} not viable: {}", visible, e);
                continue;
            }
        };

        let candidate = MatchResult {
            location: local.location.offset(visible.x, visible.y),
            ..local
        };
        best = match best {
            Some(current) if current.similarity >= candidate.similarity => Some(current),
            _ => Some(candidate),
        };
    }

    best.unwrap_or_else(MatchResult::not_found)
}
