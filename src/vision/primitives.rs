/// Image primitives
///
/// Pure functions over `image` buffers: every operation allocates a new
/// output and never mutates its input, so immutable frames and templates can
/// be shared freely between concurrent detection passes.
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgba, RgbaImage};
use rayon::prelude::*;

use super::geometry::Rect;

/// Gray level above which a Sobel response counts as an edge
pub const EDGE_THRESHOLD: u8 = 50;

/// Convert an RGBA image to grayscale using `0.299R + 0.587G + 0.114B`
pub fn to_grayscale(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return gray;
    }

    let src = image.as_raw();
    let row_in = width as usize * 4;
    let buffer: &mut [u8] = &mut gray;
    buffer
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let line = &src[y * row_in..(y + 1) * row_in];
            for (x, value) in row.iter_mut().enumerate() {
                let px = &line[x * 4..x * 4 + 3];
                *value = luminance(px[0], px[1], px[2]);
            }
        });

    gray
}

/// Luminance of a single RGB triple
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Crop an image to `rect`.
///
/// Source pixels outside the image read as zero; the output always has the
/// rectangle's size (an empty rectangle yields a 0x0 image).
pub fn crop<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    rect: Rect,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    if rect.is_empty() {
        return ImageBuffer::new(0, 0);
    }

    let mut cropped = ImageBuffer::new(rect.width as u32, rect.height as u32);
    let Some(visible) = rect.clamp_to(image.width(), image.height()) else {
        return cropped;
    };

    for y in visible.y..visible.bottom() {
        for x in visible.x..visible.right() {
            let pixel = *image.get_pixel(x as u32, y as u32);
            cropped.put_pixel((x - rect.x) as u32, (y - rect.y) as u32, pixel);
        }
    }

    cropped
}

/// Resize with nearest-neighbor sampling (`src = dst * src_size / dst_size`).
///
/// Chosen for speed: matching only needs consistent sampling between source
/// and template, not visual quality.
pub fn resize<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (src_width, src_height) = image.dimensions();
    if src_width == 0 || src_height == 0 {
        return ImageBuffer::new(width, height);
    }

    ImageBuffer::from_fn(width, height, |x, y| {
        let src_x = (x as u64 * src_width as u64 / width as u64) as u32;
        let src_y = (y as u64 * src_height as u64 / height as u64) as u32;
        *image.get_pixel(src_x, src_y)
    })
}

/// Resize both dimensions by a scale factor (minimum 1x1 for non-empty input)
pub fn scale<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    factor: f64,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let width = ((image.width() as f64 * factor) as u32).max(1);
    let height = ((image.height() as f64 * factor) as u32).max(1);
    resize(image, width, height)
}

/// RGB to HSV. Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (rf, gf, bf) = unit_rgb(r, g, b);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let value = max;
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    let hue = hue_degrees(rf, gf, bf, max, delta);

    (hue, saturation, value)
}

/// RGB to HLS. Hue in degrees `[0, 360)`, lightness and saturation in `[0, 1]`.
pub fn rgb_to_hls(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (rf, gf, bf) = unit_rgb(r, g, b);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let lightness = (max + min) / 2.0;
    let saturation = if delta == 0.0 {
        0.0
    } else if lightness < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    let hue = hue_degrees(rf, gf, bf, max, delta);

    (hue, lightness, saturation)
}

fn unit_rgb(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
}

fn hue_degrees(rf: f64, gf: f64, bf: f64, max: f64, delta: f64) -> f64 {
    if delta == 0.0 {
        return 0.0;
    }
    let sector = if max == rf {
        let h = (gf - bf) / delta;
        if h < 0.0 {
            h + 6.0
        } else {
            h
        }
    } else if max == gf {
        (bf - rf) / delta + 2.0
    } else {
        (rf - gf) / delta + 4.0
    };
    sector * 60.0
}

/// Check whether an RGB(A) pixel lies inside an inclusive per-channel range
pub fn color_in_range(pixel: &Rgba<u8>, lower: [u8; 3], upper: [u8; 3]) -> bool {
    (0..3).all(|c| pixel[c] >= lower[c] && pixel[c] <= upper[c])
}

/// Binary mask (255 inside the color range, 0 outside)
pub fn create_mask(image: &RgbaImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if color_in_range(image.get_pixel(x, y), lower, upper) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Count non-zero pixels of a mask
pub fn count_non_zero(mask: &GrayImage) -> usize {
    mask.as_raw().iter().filter(|&&v| v > 0).count()
}

/// Sobel gradient magnitude, row-parallel.
///
/// Uses `max(|gx|, |gy|) + min(|gx|, |gy|) / 2` instead of a square root; the
/// one-pixel border stays zero.
pub fn sobel_edges(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut edges = GrayImage::new(width, height);
    if width < 3 || height < 3 {
        return edges;
    }

    let w = width as usize;
    let h = height as usize;
    let src = gray.as_raw();
    let at = |x: usize, y: usize| src[y * w + x] as i32;

    let buffer: &mut [u8] = &mut edges;
    buffer
        .par_chunks_mut(w)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let tl = at(x - 1, y - 1);
                let tm = at(x, y - 1);
                let tr = at(x + 1, y - 1);
                let ml = at(x - 1, y);
                let mr = at(x + 1, y);
                let bl = at(x - 1, y + 1);
                let bm = at(x, y + 1);
                let br = at(x + 1, y + 1);

                let gx = -tl - 2 * ml - bl + tr + 2 * mr + br;
                let gy = -tl - 2 * tm - tr + bl + 2 * bm + br;

                let abs_gx = gx.abs();
                let abs_gy = gy.abs();
                row[x] = (abs_gx.max(abs_gy) + abs_gx.min(abs_gy) / 2).min(255) as u8;
            }
        });

    edges
}

/// Binarize: strictly above `level` becomes 255, everything else 0
pub fn threshold(gray: &GrayImage, level: u8) -> GrayImage {
    let (width, height) = gray.dimensions();
    let data = gray
        .as_raw()
        .iter()
        .map(|&v| if v > level { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Invert gray levels (`255 - v`)
pub fn invert(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let data = gray.as_raw().iter().map(|&v| 255 - v).collect();
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Otsu's threshold: the gray level maximizing between-class variance
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for &v in gray.as_raw() {
        histogram[v as usize] += 1;
    }

    let total = gray.as_raw().len() as u64;
    let sum: u64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as u64 * count)
        .sum();

    let mut sum_background = 0u64;
    let mut weight_background = 0u64;
    let mut best_variance = 0.0;
    let mut best_level = 0u8;

    for (level, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += level as u64 * count;
        let mean_background = sum_background as f64 / weight_background as f64;
        let mean_foreground = (sum - sum_background) as f64 / weight_foreground as f64;
        let between = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between > best_variance {
            best_variance = between;
            best_level = level as u8;
        }
    }

    best_level
}

/// Population variance; zero for an empty slice
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
