//! Scroll-and-capture sweep
//!
//! Drives the page through an ordered sweep of scroll offsets covering the
//! whole document, capturing one viewport slice per step. The last step is
//! pulled back to `totalHeight - viewportHeight` so the bottom edge is
//! captured flush; that slice overlaps its predecessor on purpose.

use crate::capture::{
    CaptureSlice, CapturedImage, Compositor, PageDimensions, PageDom, RenderPrep,
    ViewportCapturer,
};
use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delays inserted around each capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepTiming {
    /// Wait after each scroll before capturing (render/lazy-load grace)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Wait after each capture before the next scroll
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_settle_ms() -> u64 {
    300
}

fn default_pacing_ms() -> u64 {
    500
}

impl Default for SweepTiming {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl SweepTiming {
    /// No delays at all
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            pacing_ms: 0,
        }
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Scroll offsets a sweep visits, in order.
///
/// `ceil(totalHeight / viewportHeight)` steps (at least one); step `i` sits at
/// `i * viewportHeight` except the last, which sits at
/// `max(0, totalHeight - viewportHeight)`.
pub fn plan_offsets(dims: &PageDimensions) -> Result<Vec<u32>> {
    if dims.viewport_height == 0 || dims.viewport_width == 0 {
        return Err(CaptureError::InvalidDimensions(format!(
            "viewport is {}x{}",
            dims.viewport_width, dims.viewport_height
        ))
        .into());
    }

    let steps = dims.step_count();
    let last = dims.total_height.saturating_sub(dims.viewport_height);

    Ok((0..steps)
        .map(|i| {
            if i + 1 == steps {
                last
            } else {
                i as u32 * dims.viewport_height
            }
        })
        .collect())
}

/// Result of a full-page capture
#[derive(Debug, Clone)]
pub struct FullPageCapture {
    /// The stitched image
    pub image: CapturedImage,
    /// Geometry the sweep was planned from
    pub dimensions: PageDimensions,
    /// Number of viewport captures taken
    pub slice_count: usize,
}

/// Sequences scrolls and captures over one page
pub struct ScrollSequencer<'a, P: PageDom + ?Sized, C: ViewportCapturer + ?Sized> {
    dom: &'a P,
    capturer: &'a C,
    timing: SweepTiming,
}

impl<'a, P, C> ScrollSequencer<'a, P, C>
where
    P: PageDom + ?Sized,
    C: ViewportCapturer + ?Sized,
{
    /// Create a sequencer over a page and its capturer
    pub fn new(dom: &'a P, capturer: &'a C, timing: SweepTiming) -> Self {
        Self {
            dom,
            capturer,
            timing,
        }
    }

    /// Sweep the document, one capture in flight at a time.
    ///
    /// Each slice is tagged with the offset the page actually settled on. Any
    /// failure aborts the sweep; no partial result is returned.
    #[instrument(skip(self))]
    pub async fn sweep(&self, dims: &PageDimensions) -> Result<Vec<CaptureSlice>> {
        let offsets = plan_offsets(dims)?;
        info!(steps = offsets.len(), "Starting capture sweep");

        let mut slices = Vec::with_capacity(offsets.len());
        for (step, &offset) in offsets.iter().enumerate() {
            let aborted = |reason: String| CaptureError::SweepAborted {
                step,
                offset,
                reason,
            };

            let actual = self
                .dom
                .scroll_to(offset)
                .await
                .map_err(|e| aborted(e.to_string()))?;
            if actual != offset {
                warn!(step, offset, actual, "Page settled on a different offset");
            }

            tokio::time::sleep(self.timing.settle()).await;

            let image = self
                .capturer
                .capture_visible()
                .await
                .map_err(|e| aborted(e.to_string()))?;
            debug!(step, offset = actual, bytes = image.len(), "Captured slice");

            slices.push(CaptureSlice {
                image,
                vertical_offset: actual,
            });

            tokio::time::sleep(self.timing.pacing()).await;
        }

        Ok(slices)
    }

    /// Suppress render hazards, sweep, restore, then stitch.
    ///
    /// Restore runs on every exit path once suppression succeeded.
    #[instrument(skip(self))]
    pub async fn capture_full_page(&self) -> Result<FullPageCapture> {
        let prep = RenderPrep::new(self.dom);
        let record = prep.suppress().await?;

        let swept = match self.dom.dimensions().await {
            Ok(dims) => match self.dom.scroll_to(0).await {
                Ok(_) => self.sweep(&dims).await.map(|slices| (dims, slices)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let outcome = prep.restore(record).await;
        if outcome.failed > 0 {
            warn!(failed = outcome.failed, "Page state only partially restored");
        }

        let (dims, slices) = swept?;
        let slice_count = slices.len();
        // An empty document still renders as one viewport
        let height = match dims.total_height {
            0 => dims.viewport_height,
            h => h,
        };
        let image = Compositor::new()
            .with_scale(dims.device_pixel_ratio)
            .composite(&slices, dims.viewport_width, height)?;

        info!(
            slices = slice_count,
            width = image.width,
            height = image.height,
            "Full-page capture complete"
        );

        Ok(FullPageCapture {
            image,
            dimensions: dims,
            slice_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_viewport() {
        let dims = PageDimensions::new(800, 600, 800, 400);
        assert_eq!(plan_offsets(&dims).unwrap(), vec![0]);
    }

    #[test]
    fn test_plan_exact_multiple() {
        let dims = PageDimensions::new(800, 600, 800, 1800);
        assert_eq!(plan_offsets(&dims).unwrap(), vec![0, 600, 1200]);
    }

    #[test]
    fn test_plan_final_step_pulled_back() {
        let dims = PageDimensions::new(800, 600, 800, 1500);
        assert_eq!(plan_offsets(&dims).unwrap(), vec![0, 600, 900]);
    }

    #[test]
    fn test_plan_empty_document() {
        let dims = PageDimensions::new(800, 600, 800, 0);
        assert_eq!(plan_offsets(&dims).unwrap(), vec![0]);
    }

    #[test]
    fn test_plan_rejects_zero_viewport() {
        let dims = PageDimensions::new(800, 0, 800, 1000);
        assert!(plan_offsets(&dims).is_err());
    }

    #[test]
    fn test_timing_defaults() {
        let timing = SweepTiming::default();
        assert_eq!(timing.settle_ms, 300);
        assert_eq!(timing.pacing_ms, 500);
        assert_eq!(SweepTiming::immediate().settle(), Duration::ZERO);
    }
}
