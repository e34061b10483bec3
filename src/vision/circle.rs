/// Circle locator
///
/// Finds the circular minimap marker by perimeter sampling over a binary
/// Sobel edge map, then derives the full map overlay region from it.
use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

use super::geometry::Rect;
use super::primitives::{crop, sobel_edges, threshold, to_grayscale, variance, EDGE_THRESHOLD};

/// Distance between candidate centers on the search grid
pub const CENTER_GRID_STEP: usize = 5;

/// Minimum perimeter edge fraction for a minimap candidate (tuned for noisy captures)
pub const MINIMAP_MIN_SCORE: f64 = 0.35;

/// Minimum summed RGB variance for a region to look like a map
pub const MIN_REGION_VARIANCE: f64 = 1000.0;

/// Map side length as a multiple of the minimap radius
const MAP_SIZE_PER_RADIUS: i32 = 10;

/// A detected circle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    /// Fraction of sampled perimeter points that are edge pixels
    pub score: f64,
}

/// Radius range and minimum score for a circle search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    pub min_radius: i32,
    pub max_radius: i32,
    pub threshold: f64,
}

/// Binary edge map (255 = edge) of an RGBA image
pub fn edge_map(image: &RgbaImage) -> image::GrayImage {
    threshold(&sobel_edges(&to_grayscale(image)), EDGE_THRESHOLD)
}

/// Fraction of `max(32, 8 * radius)` evenly spaced perimeter samples that land
/// on edge pixels. Samples outside the image are ignored.
pub fn circle_score(edges: &image::GrayImage, cx: i32, cy: i32, radius: i32) -> f64 {
    let samples = (radius * 8).max(32);
    let (width, height) = (edges.width() as i32, edges.height() as i32);

    let mut hits = 0u32;
    let mut total = 0u32;
    for i in 0..samples {
        let angle = i as f64 * std::f64::consts::TAU / samples as f64;
        let x = cx + (radius as f64 * angle.cos()).round() as i32;
        let y = cy + (radius as f64 * angle.sin()).round() as i32;
        if x < 0 || y < 0 || x >= width || y >= height {
            continue;
        }
        total += 1;
        if edges.get_pixel(x as u32, y as u32)[0] > 128 {
            hits += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Centers closer than half the mean radius and radii within 30% of it
pub fn circles_overlap(a: &Circle, b: &Circle) -> bool {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    let distance = (dx * dx + dy * dy).sqrt();
    let radius_diff = (a.radius - b.radius).abs() as f64;
    let mean_radius = (a.radius + b.radius) as f64 / 2.0;

    distance < mean_radius * 0.5 && radius_diff < mean_radius * 0.3
}

/// Search `region` for circles matching `params`.
///
/// Candidate centers sit on a 5 px grid at least `max_radius` from the region
/// border. Candidates are merged in raster order: an overlapping candidate
/// replaces its group representative only when it scores higher.
pub fn detect_circles_in_region(
    image: &RgbaImage,
    region: Rect,
    params: CircleParams,
) -> Vec<Circle> {
    if region.is_empty() || params.min_radius <= 0 || params.max_radius < params.min_radius {
        return Vec::new();
    }

    let edges = edge_map(&crop(image, region));
    let (width, height) = (edges.width() as i32, edges.height() as i32);
    let margin = params.max_radius;
    if width <= 2 * margin || height <= 2 * margin {
        return Vec::new();
    }

    let rows: Vec<i32> = (margin..height - margin).step_by(CENTER_GRID_STEP).collect();
    let scored: Vec<Vec<Circle>> = rows
        .par_iter()
        .map(|&cy| {
            let mut row = Vec::new();
            for cx in (margin..width - margin).step_by(CENTER_GRID_STEP) {
                for radius in params.min_radius..=params.max_radius {
                    let score = circle_score(&edges, cx, cy, radius);
                    if score >= params.threshold {
                        row.push(Circle {
                            x: cx,
                            y: cy,
                            radius,
                            score,
                        });
                    }
                }
            }
            row
        })
        .collect();

    let mut circles: Vec<Circle> = Vec::new();
    for candidate in scored.into_iter().flatten() {
        match circles.iter_mut().find(|c| circles_overlap(&candidate, c)) {
            Some(existing) => {
                if candidate.score > existing.score {
                    *existing = candidate;
                }
            }
            None => circles.push(candidate),
        }
    }

    for circle in &mut circles {
        circle.x += region.x;
        circle.y += region.y;
    }
    circles
}

/// Locate the minimap in the bottom-left 30% x 30% of the frame, with a
/// radius between 4% and 8% of the frame height
pub fn find_minimap_circle(image: &RgbaImage) -> Option<Circle> {
    let (width, height) = image.dimensions();
    let region = Rect::from_fractions(width, height, [0.0, 0.70, 0.30, 0.30]);
    let params = CircleParams {
        min_radius: (height as f64 * 0.04) as i32,
        max_radius: (height as f64 * 0.08) as i32,
        threshold: MINIMAP_MIN_SCORE,
    };

    let circles = detect_circles_in_region(image, region, params);
    debug!("Minimap search found {} candidate circles", circles.len());

    circles
        .into_iter()
        .reduce(|best, c| if c.score > best.score { c } else { best })
}

/// Derive the map region from the minimap circle.
///
/// The map is a square of `10 * radius` (at most 80% of the shorter frame
/// side) with the minimap at 10% from its left and 90% from its top, clamped
/// to the frame. Without a minimap the fixed fallback region is used.
pub fn map_region_from_minimap(width: u32, height: u32, minimap: Option<&Circle>) -> Rect {
    let Some(minimap) = minimap else {
        return fallback_map_region(width, height);
    };
    let (w, h) = (width as i32, height as i32);

    let max_size = (width.min(height) as f64 * 0.8) as i32;
    let size = (minimap.radius * MAP_SIZE_PER_RADIUS).min(max_size);

    let x = (minimap.x - size / 10).max(0);
    let y = (minimap.y - size * 9 / 10).max(0);
    let map_width = size.min(w - x);
    let map_height = size.min(h - y);

    Rect::new(x, y, map_width, map_height)
}

/// Centered region covering 70% of the frame with a 15% margin
pub fn fallback_map_region(width: u32, height: u32) -> Rect {
    Rect::from_fractions(width, height, [0.15, 0.15, 0.70, 0.70])
}

/// Preset map regions for common layouts: 15%, 10% and 12% margins
pub fn preset_regions(width: u32, height: u32) -> Vec<Rect> {
    vec![
        Rect::from_fractions(width, height, [0.15, 0.15, 0.70, 0.70]),
        Rect::from_fractions(width, height, [0.10, 0.10, 0.80, 0.80]),
        Rect::from_fractions(width, height, [0.12, 0.12, 0.75, 0.75]),
    ]
}

/// Reject near-uniform regions (loading screens, solid fills) by summed
/// per-channel variance over a 10x10 sample grid
pub fn verify_region(image: &RgbaImage, region: Rect) -> bool {
    if region
        .clamp_to(image.width(), image.height())
        .is_none()
    {
        return false;
    }

    let patch = crop(image, region);
    let (width, height) = patch.dimensions();
    let step_x = (width / 10).max(1) as usize;
    let step_y = (height / 10).max(1) as usize;

    let mut channels: [Vec<f64>; 3] = Default::default();
    for y in (0..height).step_by(step_y) {
        for x in (0..width).step_by(step_x) {
            let px = patch.get_pixel(x, y);
            for (c, values) in channels.iter_mut().enumerate() {
                values.push(px[c] as f64);
            }
        }
    }

    let total: f64 = channels.iter().map(|values| variance(values)).sum();
    total > MIN_REGION_VARIANCE
}
