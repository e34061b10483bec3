/// Pixel-level vision engine
///
/// Module structure:
/// - `geometry`: Point and Rect value types
/// - `primitives`: grayscale, crop, resize, color spaces, masks, edges
/// - `matching`: similarity metric and template matching variants
/// - `candidates`: bright-pixel pre-filter for candidate windows
/// - `circle`: minimap circle locator and map region derivation
pub mod candidates;
pub mod circle;
pub mod geometry;
pub mod matching;
pub mod primitives;

pub use candidates::{
    bright_ratio, find_candidate_regions, has_bright_pixels, rank_candidate_regions,
    CandidateRegion,
};
pub use circle::{
    circle_score, circles_overlap, detect_circles_in_region, fallback_map_region,
    find_minimap_circle, map_region_from_minimap, preset_regions, verify_region, Circle,
    CircleParams,
};
pub use geometry::{Point, Rect};
pub use matching::{
    similarity, template_match, template_match_multiple, template_match_pyramid,
    template_match_strided, MatchResult,
};
pub use primitives::{
    color_in_range, create_mask, crop, invert, otsu_threshold, resize, rgb_to_hls, rgb_to_hsv,
    sobel_edges, threshold, to_grayscale, variance,
};
