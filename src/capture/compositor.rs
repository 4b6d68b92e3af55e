//! Slice compositing
//!
//! Draws each slice at `(0, offset)` on a `width x totalHeight` canvas in
//! sweep order. A later slice overwrites whatever it overlaps, which is how
//! the pulled-back final slice lands flush with the document bottom.
//!
//! At fractional pixel ratios a slice's decoded height and its rounded
//! offset can disagree by a row. A slice never starts below the last row
//! already painted, and the canvas never extends past the painted rows.

use crate::capture::{CaptureSlice, CapturedImage};
use crate::error::{CaptureError, Result};
use image::{imageops, DynamicImage, RgbaImage};
use tracing::{debug, instrument, warn};

/// Stitches sweep slices into one image
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    scale: f64,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// Compositor for captures at one image pixel per CSS pixel
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }

    /// Image pixels per CSS pixel of the captured slices
    pub fn with_scale(mut self, scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        }
        self
    }

    fn to_pixels(&self, css: u32) -> u32 {
        (css as f64 * self.scale).round() as u32
    }

    /// Composite `slices` onto a `width x total_height` (CSS px) canvas.
    ///
    /// Every slice is decoded before the first one is drawn. The result is
    /// shorter than `total_height` only when the slices cannot cover it.
    #[instrument(skip(self, slices), fields(slices = slices.len()))]
    pub fn composite(
        &self,
        slices: &[CaptureSlice],
        width: u32,
        total_height: u32,
    ) -> Result<CapturedImage> {
        if slices.is_empty() {
            return Err(CaptureError::EmptySweep.into());
        }

        let canvas_width = self.to_pixels(width);
        let target_height = self.to_pixels(total_height);
        if canvas_width == 0 || target_height == 0 {
            return Err(CaptureError::CompositeFailed(format!(
                "canvas would be {canvas_width}x{target_height}"
            ))
            .into());
        }

        let decoded = slices
            .iter()
            .enumerate()
            .map(|(i, slice)| {
                image::load_from_memory(&slice.image)
                    .map(|img| (img.to_rgba8(), slice.vertical_offset))
                    .map_err(|e| CaptureError::CompositeFailed(format!("slice {i}: {e}")))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let placed = place_slices(
            decoded.iter().map(|(raster, offset)| (self.to_pixels(*offset), raster.height())),
            target_height,
        );
        let painted = placed
            .iter()
            .zip(&decoded)
            .map(|(y, (raster, _))| y + raster.height())
            .max()
            .unwrap_or(0);
        let canvas_height = target_height.min(painted);
        if canvas_height < target_height {
            warn!(canvas_height, target_height, "Slices do not cover the document");
        }

        let mut canvas = RgbaImage::new(canvas_width, canvas_height);
        for (y, (raster, _)) in placed.iter().zip(&decoded) {
            imageops::replace(&mut canvas, raster, 0, *y as i64);
            debug!(y, height = raster.height(), "Drew slice");
        }

        CapturedImage::from_raster(&DynamicImage::ImageRgba8(canvas))
    }
}

/// Pixel rows to draw each `(offset, height)` slice at.
///
/// Rows stay contiguous from 0, and the last slice is pulled down to end at
/// `bottom` when that leaves no gap above it.
fn place_slices(slices: impl ExactSizeIterator<Item = (u32, u32)>, bottom: u32) -> Vec<u32> {
    let count = slices.len();
    let mut painted = 0u32;
    let mut rows = Vec::with_capacity(count);

    for (i, (offset, height)) in slices.enumerate() {
        let mut y = offset.min(painted);
        if i + 1 == count {
            y = y.max(bottom.saturating_sub(height)).min(painted);
        }
        painted = painted.max(y + height);
        rows.push(y);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> Vec<u8> {
        let raster = RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]));
        CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster))
            .unwrap()
            .data
    }

    #[test]
    fn test_composite_dimensions() {
        let slices = vec![
            CaptureSlice { image: solid(10, 4, 10), vertical_offset: 0 },
            CaptureSlice { image: solid(10, 4, 20), vertical_offset: 4 },
            CaptureSlice { image: solid(10, 4, 30), vertical_offset: 6 },
        ];

        let out = Compositor::new().composite(&slices, 10, 10).unwrap();
        assert_eq!((out.width, out.height), (10, 10));
    }

    #[test]
    fn test_final_slice_overwrites_overlap() {
        let slices = vec![
            CaptureSlice { image: solid(4, 4, 10), vertical_offset: 0 },
            CaptureSlice { image: solid(4, 4, 20), vertical_offset: 4 },
            CaptureSlice { image: solid(4, 4, 30), vertical_offset: 6 },
        ];

        let out = Compositor::new().composite(&slices, 4, 10).unwrap();
        let raster = out.decode().unwrap().to_rgba8();

        assert_eq!(raster.get_pixel(0, 3)[0], 10);
        assert_eq!(raster.get_pixel(0, 5)[0], 20);
        assert_eq!(raster.get_pixel(0, 6)[0], 30);
        assert_eq!(raster.get_pixel(0, 9)[0], 30);
    }

    #[test]
    fn test_scaled_composite() {
        let slices = vec![
            CaptureSlice { image: solid(8, 8, 50), vertical_offset: 0 },
            CaptureSlice { image: solid(8, 8, 60), vertical_offset: 2 },
        ];

        let out = Compositor::new().with_scale(2.0).composite(&slices, 4, 6).unwrap();
        assert_eq!((out.width, out.height), (8, 12));

        let raster = out.decode().unwrap().to_rgba8();
        assert_eq!(raster.get_pixel(0, 3)[0], 50);
        assert_eq!(raster.get_pixel(0, 4)[0], 60);
        assert_eq!(raster.get_pixel(7, 11)[3], 255);
    }

    #[test]
    fn test_fractional_scale_closes_rounding_gap() {
        // 601 CSS rows at 1.5x: the offset rounds to 902 but the slice has 901
        let slices = vec![
            CaptureSlice { image: solid(3, 901, 40), vertical_offset: 0 },
            CaptureSlice { image: solid(3, 901, 80), vertical_offset: 601 },
        ];

        let out = Compositor::new().with_scale(1.5).composite(&slices, 2, 1202).unwrap();
        assert_eq!((out.width, out.height), (3, 1802));

        let raster = out.decode().unwrap().to_rgba8();
        assert_eq!(raster.get_pixel(0, 900)[0], 40);
        assert_eq!(raster.get_pixel(0, 901)[0], 80);
        assert!(raster.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_place_slices() {
        assert_eq!(place_slices([(0, 4), (4, 4), (6, 4)].into_iter(), 10), vec![0, 4, 6]);
        assert_eq!(place_slices([(0, 3), (4, 3)].into_iter(), 7), vec![0, 3]);
        assert_eq!(place_slices([(0, 5), (4, 5)].into_iter(), 10), vec![0, 5]);
        assert_eq!(place_slices([(0, 8)].into_iter(), 5), vec![0]);
    }

    #[test]
    fn test_empty_slices_rejected() {
        let err = Compositor::new().composite(&[], 10, 10).unwrap_err();
        assert!(err.to_string().contains("No slices"));
    }

    #[test]
    fn test_undecodable_slice_rejected() {
        let slices = vec![CaptureSlice { image: b"not a png".to_vec(), vertical_offset: 0 }];
        let err = Compositor::new().composite(&slices, 10, 10).unwrap_err();
        assert!(err.to_string().contains("slice 0"));
    }
}
