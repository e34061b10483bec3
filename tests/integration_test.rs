// Integration tests for overlay-detect
// These run the detectors end to end on synthetic game frames

use std::path::Path;
use std::sync::Arc;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use overlay_detect::capture::StaticFrameSource;
use overlay_detect::config::Config;
use overlay_detect::detection::{
    AssetProvider, CascadingDetector, DetectionResult, DetectionStrategy, Detector,
    DetectorSettings, Language, MapRegionDetector, Template, TemplateLibrary, TemplateSet,
};
use overlay_detect::error::TemplateError;
use overlay_detect::scheduler::Scheduler;
use overlay_detect::vision::{crop, invert, template_match_pyramid, Point, Rect};

const STROKE: u8 = 240;
const BACKGROUND: u8 = 30;

/// Roman numeral with `strokes` vertical bars, 20 px high, 6 px margins
fn numeral(strokes: u32) -> GrayImage {
    let width = 8 + 8 * strokes;
    GrayImage::from_fn(width, 20, |x, y| {
        let on_bar = x >= 6 && (x - 6) % 8 < 4 && (x - 6) / 8 < strokes;
        if on_bar && (3..17).contains(&y) {
            Luma([STROKE])
        } else {
            Luma([BACKGROUND])
        }
    })
}

fn to_rgba(gray: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgba([v, v, v, 255])
    })
}

/// Serves `<code>_<n>.png` as the numeral with n strokes
struct NumeralAssets;

impl AssetProvider for NumeralAssets {
    fn load(&self, path: &Path) -> Result<RgbaImage, TemplateError> {
        let name = path.to_string_lossy();
        let strokes = name
            .rsplit('_')
            .next()
            .and_then(|tail| tail.trim_end_matches(".png").parse::<u32>().ok())
            .ok_or_else(|| TemplateError::LoadFailed {
                path: name.to_string(),
                source: "unexpected template name".into(),
            })?;
        Ok(to_rgba(&numeral(strokes)))
    }
}

fn numeral_library() -> Arc<TemplateLibrary> {
    let library = TemplateLibrary::load(
        &NumeralAssets,
        &[Language::English, Language::Japanese],
        3,
    )
    .unwrap();
    Arc::new(library)
}

/// Mid-gray clutter with `strokes` pasted at `(px, py)`
fn cluttered_scene(strokes: u32, px: u32, py: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut frame = RgbaImage::from_fn(240, 160, |_, _| {
        let v: u8 = rng.gen_range(90..=170);
        Rgba([v, v, v, 255])
    });

    let glyph = numeral(strokes);
    for (x, y, p) in glyph.enumerate_pixels() {
        let v = p[0];
        frame.put_pixel(px + x, py + y, Rgba([v, v, v, 255]));
    }
    frame
}

fn detector(library: Arc<TemplateLibrary>) -> CascadingDetector {
    let settings = DetectorSettings {
        match_threshold: 0.9,
        search_radius: 40,
        ..DetectorSettings::default()
    };
    CascadingDetector::new("day", library, settings).unwrap()
}

#[test]
fn test_each_numeral_is_told_apart() {
    let library = numeral_library();

    for (strokes, seed) in [(1, 11), (2, 12), (3, 13)] {
        let mut day = detector(Arc::clone(&library));
        let frame = cluttered_scene(strokes, 100, 70, seed);

        match day.detect(&frame) {
            DetectionResult::Symbol {
                index,
                label,
                location,
                strategy,
                ..
            } => {
                assert_eq!(index, strokes as usize - 1, "numeral with {} strokes", strokes);
                assert_eq!(label, format!("eng_{}", strokes));
                assert_eq!(location, Point::new(100, 70));
                assert_eq!(strategy, DetectionStrategy::Predefined);
            }
            other => panic!("numeral with {} strokes not detected: {:?}", strokes, other),
        }
    }
}

#[test]
fn test_moved_symbol_is_found_through_hotspot() {
    let mut day = detector(numeral_library());

    let first = day.detect(&cluttered_scene(2, 100, 70, 21));
    assert_eq!(first.symbol_index(), Some(1));
    assert_eq!(day.hotspot(), Some(Point::new(100, 70)));

    let moved = day.detect(&cluttered_scene(2, 103, 72, 22));
    match moved {
        DetectionResult::Symbol {
            index,
            location,
            strategy,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(location, Point::new(103, 72));
            assert_eq!(strategy, DetectionStrategy::HotspotCache);
        }
        other => panic!("expected a hotspot hit, got {:?}", other),
    }

    let stats = day.stats();
    assert_eq!(stats.hits(DetectionStrategy::HotspotCache), 1);
    assert_eq!(stats.hits(DetectionStrategy::Predefined), 1);
    assert_eq!(stats.total_calls, 2);
}

#[test]
fn test_language_switch_uses_other_set() {
    let mut day = detector(numeral_library());
    day.set_language(Language::Japanese).unwrap();

    match day.detect(&cluttered_scene(3, 100, 70, 31)) {
        DetectionResult::Symbol { index, label, .. } => {
            assert_eq!(index, 2);
            assert_eq!(label, "jp_3");
        }
        other => panic!("expected a symbol, got {:?}", other),
    }

    assert!(matches!(
        day.set_language(Language::SimplifiedChinese),
        Err(TemplateError::MissingLanguage(Language::SimplifiedChinese))
    ));
}

/// 16x16 high-frequency pattern
fn pattern() -> GrayImage {
    GrayImage::from_fn(16, 16, |x, y| Luma([((x * 37 + y * 91) % 200 + 40) as u8]))
}

/// `base` with a `size` x `size` block at (4, 4) shifted by 120 levels
fn altered(base: &GrayImage, size: u32) -> GrayImage {
    let mut out = base.clone();
    for y in 4..4 + size {
        for x in 4..4 + size {
            let v = base.get_pixel(x, y)[0];
            let shifted = if v < 128 { v + 120 } else { v - 120 };
            out.put_pixel(x, y, Luma([shifted]));
        }
    }
    out
}

fn pattern_frame() -> RgbaImage {
    let mut frame = RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255]));
    for (x, y, p) in pattern().enumerate_pixels() {
        let v = p[0];
        frame.put_pixel(20 + x, 12 + y, Rgba([v, v, v, 255]));
    }
    frame
}

fn full_scan_detector(other: GrayImage) -> CascadingDetector {
    let set = TemplateSet::new(
        Language::English,
        vec![
            Template::from_gray("a", pattern()),
            Template::from_gray("b", other),
            Template::from_gray("c", invert(&pattern())),
        ],
    )
    .unwrap();
    let mut library = TemplateLibrary::new();
    library.insert(set);

    let mut detector =
        CascadingDetector::new("pattern", Arc::new(library), DetectorSettings::default()).unwrap();
    detector.set_strategy(DetectionStrategy::FullScan);
    detector
}

#[test]
fn test_near_identical_templates_are_ambiguous() {
    // 2x2 difference: both templates score within the confidence gap
    let mut detector = full_scan_detector(altered(&pattern(), 2));
    assert_eq!(detector.detect(&pattern_frame()), DetectionResult::NotDetected);
    assert_eq!(detector.stats().total_hits, 0);
}

#[test]
fn test_clear_gap_selects_winner() {
    // 8x8 difference: the exact template leads by more than the gap
    let mut detector = full_scan_detector(altered(&pattern(), 8));
    match detector.detect(&pattern_frame()) {
        DetectionResult::Symbol {
            index, location, ..
        } => {
            assert_eq!(index, 0);
            assert_eq!(location, Point::new(20, 12));
        }
        other => panic!("expected a winner, got {:?}", other),
    }
}

/// Numeral cropped to its strokes: "I" is pixel-for-pixel inside "II" and "III"
fn tight_numeral(strokes: u32) -> GrayImage {
    GrayImage::from_fn(8 * strokes - 4, 20, |x, y| {
        if x % 8 < 4 && (3..17).contains(&y) {
            Luma([STROKE])
        } else {
            Luma([BACKGROUND])
        }
    })
}

fn tight_scene(strokes: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut frame = RgbaImage::from_fn(120, 80, |_, _| {
        let v: u8 = rng.gen_range(90..=170);
        Rgba([v, v, v, 255])
    });
    for (x, y, p) in tight_numeral(strokes).enumerate_pixels() {
        let v = p[0];
        frame.put_pixel(50 + x, 30 + y, Rgba([v, v, v, 255]));
    }
    frame
}

fn tight_detector(containment: Vec<usize>) -> CascadingDetector {
    let templates = (1..=3)
        .map(|n| Template::from_gray(format!("eng_{}", n), tight_numeral(n)))
        .collect();
    let set = TemplateSet::new(Language::English, templates)
        .unwrap()
        .with_containment(containment)
        .unwrap();
    let mut library = TemplateLibrary::new();
    library.insert(set);

    let settings = DetectorSettings {
        match_threshold: 0.9,
        ..DetectorSettings::default()
    };
    let mut detector = CascadingDetector::new("tight", Arc::new(library), settings).unwrap();
    detector.set_strategy(DetectionStrategy::FullScan);
    detector
}

#[test]
fn test_contained_symbol_needs_clear_lead() {
    // "I" scores 1.0 inside "II" as well; only the lead rule separates them
    for seed in [61, 62, 63] {
        let scene = tight_scene(2, seed);

        match tight_detector(vec![0]).detect(&scene) {
            DetectionResult::Symbol {
                index, location, ..
            } => {
                assert_eq!(index, 1, "seed {}", seed);
                assert_eq!(location, Point::new(50, 30));
            }
            other => panic!("expected \"II\" for seed {}, got {:?}", seed, other),
        }

        // without a superset member "I" and "II" tie
        assert_eq!(
            tight_detector(vec![]).detect(&scene),
            DetectionResult::NotDetected,
            "seed {}",
            seed
        );
    }

    let lone = tight_scene(1, 64);
    assert_eq!(tight_detector(vec![0]).detect(&lone).symbol_index(), Some(0));
}

#[test]
fn test_containment_chain_resolves_longest_symbol() {
    let scene = tight_scene(3, 71);

    // "I", "II" and "III" all score 1.0; a single superset leaves a tie
    assert_eq!(
        tight_detector(vec![0]).detect(&scene),
        DetectionResult::NotDetected
    );

    let mut chained = tight_detector(vec![0, 1]);
    assert_eq!(chained.detect(&scene).symbol_index(), Some(2));
    assert_eq!(
        chained.detect(&tight_scene(2, 72)).symbol_index(),
        Some(1)
    );
    assert_eq!(
        chained.detect(&tight_scene(1, 73)).symbol_index(),
        Some(0)
    );
}

#[test]
fn test_pyramid_matches_full_resolution_location() {
    // Checkerboard glyph on 4 px blocks over a smooth gradient
    let source = GrayImage::from_fn(160, 120, |x, y| {
        let inside = (64..88).contains(&x) && (48..64).contains(&y);
        if !inside {
            return Luma([((x + y) / 3 + 40) as u8]);
        }
        let (bx, by) = ((x - 64) / 4, (y - 48) / 4);
        Luma([if (bx + by) % 2 == 0 { 230 } else { 40 }])
    });
    let template = crop(&source, Rect::new(64, 48, 24, 16));

    let result = template_match_pyramid(&source, &template, 0.9, &[0.25, 0.5, 1.0], 2).unwrap();

    assert!(result.found);
    assert_eq!(result.location, Point::new(64, 48));
    assert_eq!(result.similarity, 1.0);
}

#[test]
fn test_scheduler_cycle_runs_all_detectors() {
    let frame = cluttered_scene(2, 100, 70, 41);
    let scheduler = Scheduler::new(Config::default().capture_interval(), 10);
    scheduler.register(Box::new(detector(numeral_library())));
    scheduler.register(Box::new(MapRegionDetector::new("map")));

    assert_eq!(scheduler.run_cycle(&frame), 2);

    let reports: Vec<_> = scheduler.receiver().try_iter().collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].detector, "day");
    assert_eq!(reports[0].result.symbol_index(), Some(1));
    assert_eq!(reports[1].detector, "map");
    assert!(matches!(reports[1].result, DetectionResult::Region { .. }));
}

#[test]
fn test_scheduler_thread_delivers_reports() {
    let frame = cluttered_scene(1, 100, 70, 51);
    let scheduler = Scheduler::new(std::time::Duration::from_millis(20), 4);
    scheduler.register(Box::new(detector(numeral_library())));

    scheduler
        .start(Box::new(StaticFrameSource::new(frame)))
        .unwrap();
    let report = scheduler
        .receiver()
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();
    scheduler.stop().unwrap();

    assert_eq!(report.result.symbol_index(), Some(0));
    assert!(scheduler.stats().cycles >= 1);
}
