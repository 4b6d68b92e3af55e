//! Property-based tests for sweep planning and compositing.
//!
//! Uses proptest to generate document/viewport geometries and checks the
//! step count, the flush final offset, and that a stitched sweep reproduces
//! every document row.

mod common;

use common::{row_color, FakePage};
use image::{DynamicImage, Rgba, RgbaImage};
use pinshot::capture::{plan_offsets, CaptureSlice, Compositor, ScrollSequencer, SweepTiming};
use pinshot::{CapturedImage, PageDimensions};
use proptest::prelude::*;

// ============================================================================
// STRATEGIES
// ============================================================================

/// Viewport height and total document height, both in CSS px
fn arb_geometry() -> impl Strategy<Value = (u32, u32)> {
    (1u32..2000, 0u32..50_000)
}

/// Small geometries cheap enough to render and stitch
fn arb_small_geometry() -> impl Strategy<Value = (u32, u32, u32)> {
    (1u32..8, 1u32..40, 1u32..160)
}

/// Viewport, document height and a fractional device pixel ratio
fn arb_scaled_geometry() -> impl Strategy<Value = (u32, u32, f64)> {
    (1u32..120, 1u32..600, prop::sample::select(vec![1.25, 1.5, 1.75, 2.5, 3.0]))
}

/// How the browser sized a viewport capture
#[derive(Debug, Clone, Copy)]
enum SliceRounding {
    Floor,
    Round,
    Ceil,
}

fn arb_rounding() -> impl Strategy<Value = SliceRounding> {
    prop_oneof![
        Just(SliceRounding::Floor),
        Just(SliceRounding::Round),
        Just(SliceRounding::Ceil),
    ]
}

fn opaque(width: u32, height: u32) -> Vec<u8> {
    let raster = RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255]));
    CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster))
        .unwrap()
        .data
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // Sweep planning
    // ========================================================================

    #[test]
    fn prop_step_count_is_ceil((viewport, total) in arb_geometry()) {
        let dims = PageDimensions::new(1024, viewport, 1024, total);
        let offsets = plan_offsets(&dims).unwrap();

        let expected = total.div_ceil(viewport).max(1) as usize;
        prop_assert_eq!(offsets.len(), expected);
    }

    #[test]
    fn prop_final_offset_is_flush((viewport, total) in arb_geometry()) {
        let dims = PageDimensions::new(1024, viewport, 1024, total);
        let offsets = plan_offsets(&dims).unwrap();

        prop_assert_eq!(*offsets.last().unwrap(), total.saturating_sub(viewport));
    }

    #[test]
    fn prop_offsets_cover_document((viewport, total) in arb_geometry()) {
        let dims = PageDimensions::new(1024, viewport, 1024, total);
        let offsets = plan_offsets(&dims).unwrap();

        prop_assert_eq!(offsets[0], 0);
        for pair in offsets.windows(2) {
            prop_assert!(pair[1] > pair[0], "offsets must increase: {:?}", pair);
            prop_assert!(pair[1] - pair[0] <= viewport, "gap between {:?}", pair);
        }
        let last = *offsets.last().unwrap();
        prop_assert!(last + viewport >= total);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ========================================================================
    // Stitching
    // ========================================================================

    #[test]
    fn prop_composite_reproduces_document((width, viewport, total) in arb_small_geometry()) {
        let page = FakePage::new(width, viewport, total);
        let sequencer = ScrollSequencer::new(&page, &page, SweepTiming::immediate());

        let capture = tokio_test::block_on(sequencer.capture_full_page()).unwrap();

        prop_assert_eq!(capture.slice_count, total.div_ceil(viewport) as usize);
        prop_assert_eq!((capture.image.width, capture.image.height), (width, total));

        let stitched = capture.image.decode().unwrap().to_rgba8();
        for y in 0..total {
            prop_assert_eq!(*stitched.get_pixel(width - 1, y), row_color(y), "row {}", y);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // ========================================================================
    // Fractional pixel ratios
    // ========================================================================

    #[test]
    fn prop_fractional_scale_leaves_no_gaps(
        (viewport, total, scale) in arb_scaled_geometry(),
        rounding in arb_rounding(),
    ) {
        let exact = viewport as f64 * scale;
        let height = match rounding {
            SliceRounding::Floor => exact.floor(),
            SliceRounding::Round => exact.round(),
            SliceRounding::Ceil => exact.ceil(),
        }
        .max(1.0) as u32;
        let width = (2.0 * scale).round() as u32;

        let dims = PageDimensions::new(2, viewport, 2, total);
        let slices: Vec<_> = plan_offsets(&dims)
            .unwrap()
            .into_iter()
            .map(|offset| CaptureSlice { image: opaque(width, height), vertical_offset: offset })
            .collect();

        let image = Compositor::new().with_scale(scale).composite(&slices, 2, total).unwrap();
        let target = (total as f64 * scale).round() as u32;
        prop_assert!(image.height <= target);
        if matches!(rounding, SliceRounding::Ceil) {
            prop_assert_eq!(image.height, target);
        }

        let raster = image.decode().unwrap().to_rgba8();
        for y in 0..raster.height() {
            prop_assert_eq!(raster.get_pixel(0, y)[3], 255, "row {} of {}", y, raster.height());
        }
    }
}
