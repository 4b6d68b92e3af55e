//! Region selection
//!
//! A drag gesture over the captured viewport becomes a [`SelectionRect`]:
//!
//! ```text
//! Idle ──pointer-down──▶ Selecting ──pointer-up──▶ Finalized
//!   │                     │  ▲ pointer-move
//!   └──────Escape─────────┴──┴──────────────────▶ Cancelled
//! ```
//!
//! The selected rectangle is then cropped out of the source image.

use crate::agent::{InteractionSource, UiEvent};
use crate::capture::CapturedImage;
use crate::error::{CaptureError, Result};
use crate::geometry::{Point, SelectionRect, Size};
use async_trait::async_trait;
use image::GenericImageView;
use tracing::{debug, info, instrument, warn};

/// Selections smaller than this (CSS px, either side) are discarded
pub const MIN_SELECTION_PX: u32 = 4;

/// Visible artifacts of an in-progress selection
#[async_trait]
pub trait SelectionSurface: Send + Sync {
    /// Cover the viewport with the dimmed, crosshair selection overlay
    async fn show_selection_overlay(&self) -> Result<()>;

    /// Draw (or move) the selection rectangle
    async fn draw_selection(&self, rect: &SelectionRect) -> Result<()>;

    /// Remove the overlay and the rectangle
    async fn remove_selection_overlay(&self) -> Result<()>;
}

/// Selector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// Overlay shown, waiting for a press
    Idle,
    /// Dragging
    Selecting {
        /// Where the press happened
        anchor: Point,
        /// Current bounding box of anchor and pointer
        rect: SelectionRect,
    },
    /// Released with a usable rectangle
    Finalized(SelectionRect),
    /// Released with a degenerate rectangle
    Discarded,
    /// Torn down by Escape
    Cancelled,
}

impl SelectorState {
    /// Whether the selector accepts no more input
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SelectorState::Finalized(_) | SelectorState::Discarded | SelectorState::Cancelled
        )
    }
}

/// What one input event did to the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorStep {
    /// Event had no effect
    Ignored,
    /// Drag began
    Started(SelectionRect),
    /// Drag continued
    Updated(SelectionRect),
    /// Drag ended with a usable rectangle
    Finalized(SelectionRect),
    /// Drag ended with a rectangle below the minimum size
    Discarded,
    /// Escape pressed
    Cancelled,
}

/// Drag-to-select state machine
#[derive(Debug, Clone)]
pub struct RegionSelector {
    state: SelectorState,
    bounds: Size,
    min_size: u32,
}

impl RegionSelector {
    /// Selector over a viewport of `bounds` CSS pixels
    pub fn new(bounds: Size) -> Self {
        Self {
            state: SelectorState::Idle,
            bounds,
            min_size: MIN_SELECTION_PX,
        }
    }

    /// Override the minimum selection size
    pub fn with_min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size.max(1);
        self
    }

    /// Current state
    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Feed one input event
    pub fn handle(&mut self, event: &UiEvent) -> SelectorStep {
        if self.state.is_terminal() {
            return SelectorStep::Ignored;
        }

        match (self.state, event) {
            (_, UiEvent::Escape) => {
                self.state = SelectorState::Cancelled;
                SelectorStep::Cancelled
            }
            (SelectorState::Idle, UiEvent::PointerDown { x, y }) => {
                let anchor = Point::new(*x, *y);
                let rect = SelectionRect::from_corners(anchor, anchor);
                self.state = SelectorState::Selecting { anchor, rect };
                SelectorStep::Started(rect)
            }
            (SelectorState::Selecting { anchor, .. }, UiEvent::PointerMove { x, y }) => {
                let rect = SelectionRect::from_corners(anchor, Point::new(*x, *y));
                self.state = SelectorState::Selecting { anchor, rect };
                SelectorStep::Updated(rect)
            }
            (SelectorState::Selecting { anchor, .. }, UiEvent::PointerUp { x, y }) => {
                let rect = SelectionRect::from_corners(anchor, Point::new(*x, *y));
                match self.accept(rect) {
                    Some(rect) => {
                        self.state = SelectorState::Finalized(rect);
                        SelectorStep::Finalized(rect)
                    }
                    None => {
                        self.state = SelectorState::Discarded;
                        SelectorStep::Discarded
                    }
                }
            }
            _ => SelectorStep::Ignored,
        }
    }

    fn accept(&self, rect: SelectionRect) -> Option<SelectionRect> {
        rect.clamp_to(self.bounds)
            .filter(|r| r.width >= self.min_size && r.height >= self.min_size)
    }
}

/// How a selection gesture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// A usable rectangle was selected
    Selected(SelectionRect),
    /// The rectangle was below the minimum size
    Discarded,
    /// Escape, or the input source ended first
    Cancelled,
}

/// Run one selection gesture against a page surface.
///
/// The overlay is removed on every exit path.
#[instrument(skip(surface, events, selector))]
pub async fn run_selection<S, E>(
    surface: &S,
    events: &mut E,
    mut selector: RegionSelector,
) -> Result<SelectionOutcome>
where
    S: SelectionSurface + ?Sized,
    E: InteractionSource + ?Sized,
{
    surface.show_selection_overlay().await?;

    let outcome = drive(surface, events, &mut selector).await;

    if let Err(e) = surface.remove_selection_overlay().await {
        warn!("Failed to remove selection overlay: {}", e);
    }

    let outcome = outcome?;
    info!(?outcome, "Selection finished");
    Ok(outcome)
}

async fn drive<S, E>(
    surface: &S,
    events: &mut E,
    selector: &mut RegionSelector,
) -> Result<SelectionOutcome>
where
    S: SelectionSurface + ?Sized,
    E: InteractionSource + ?Sized,
{
    while let Some(event) = events.next_event().await {
        match selector.handle(&event) {
            SelectorStep::Ignored => {}
            SelectorStep::Started(rect) | SelectorStep::Updated(rect) => {
                surface.draw_selection(&rect).await?;
            }
            SelectorStep::Finalized(rect) => return Ok(SelectionOutcome::Selected(rect)),
            SelectorStep::Discarded => return Ok(SelectionOutcome::Discarded),
            SelectorStep::Cancelled => return Ok(SelectionOutcome::Cancelled),
        }
    }

    debug!("Input ended before the selection finished");
    Ok(SelectionOutcome::Cancelled)
}

/// Crop `rect` (CSS px) out of `source`, scaling by the capture's pixel ratio
#[instrument(skip(source), fields(source_width = source.width, source_height = source.height))]
pub fn crop(source: &CapturedImage, rect: &SelectionRect, scale: f64) -> Result<CapturedImage> {
    let raster = source.decode()?;
    let (width, height) = raster.dimensions();

    let region = rect
        .scaled(scale)
        .clamp_to(Size::new(width, height))
        .ok_or_else(|| {
            CaptureError::CropFailed(format!(
                "selection {rect:?} lies outside the {width}x{height} source"
            ))
        })?;

    let cropped = raster.crop_imm(
        region.left as u32,
        region.top as u32,
        region.width,
        region.height,
    );
    debug!(width = region.width, height = region.height, "Cropped selection");
    CapturedImage::from_raster(&cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedInteractions;
    use image::{DynamicImage, Rgba, RgbaImage};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SelectionSurface for RecordingSurface {
        async fn show_selection_overlay(&self) -> Result<()> {
            self.calls.lock().push("show".into());
            Ok(())
        }

        async fn draw_selection(&self, rect: &SelectionRect) -> Result<()> {
            self.calls
                .lock()
                .push(format!("draw {} {} {} {}", rect.left, rect.top, rect.width, rect.height));
            Ok(())
        }

        async fn remove_selection_overlay(&self) -> Result<()> {
            self.calls.lock().push("remove".into());
            Ok(())
        }
    }

    fn viewport() -> Size {
        Size::new(800, 600)
    }

    #[test]
    fn test_drag_up_and_left() {
        let mut selector = RegionSelector::new(viewport());
        selector.handle(&UiEvent::PointerDown { x: 100, y: 100 });
        selector.handle(&UiEvent::PointerMove { x: 40, y: 30 });
        let step = selector.handle(&UiEvent::PointerUp { x: 40, y: 30 });

        assert_eq!(step, SelectorStep::Finalized(SelectionRect::new(40, 30, 60, 70)));
        assert!(selector.state().is_terminal());
    }

    #[test]
    fn test_move_before_press_ignored() {
        let mut selector = RegionSelector::new(viewport());
        assert_eq!(
            selector.handle(&UiEvent::PointerMove { x: 10, y: 10 }),
            SelectorStep::Ignored
        );
        assert_eq!(selector.state(), SelectorState::Idle);
    }

    #[test]
    fn test_tiny_selection_discarded() {
        let mut selector = RegionSelector::new(viewport());
        selector.handle(&UiEvent::PointerDown { x: 10, y: 10 });
        let step = selector.handle(&UiEvent::PointerUp { x: 12, y: 50 });
        assert_eq!(step, SelectorStep::Discarded);
    }

    #[test]
    fn test_selection_clamped_to_viewport() {
        let mut selector = RegionSelector::new(viewport());
        selector.handle(&UiEvent::PointerDown { x: 700, y: 500 });
        let step = selector.handle(&UiEvent::PointerUp { x: 900, y: 700 });
        assert_eq!(step, SelectorStep::Finalized(SelectionRect::new(700, 500, 100, 100)));
    }

    #[test]
    fn test_escape_cancels_mid_drag() {
        let mut selector = RegionSelector::new(viewport());
        selector.handle(&UiEvent::PointerDown { x: 10, y: 10 });
        assert_eq!(selector.handle(&UiEvent::Escape), SelectorStep::Cancelled);
        assert_eq!(
            selector.handle(&UiEvent::PointerUp { x: 50, y: 50 }),
            SelectorStep::Ignored
        );
    }

    #[tokio::test]
    async fn test_run_selection_draws_and_tears_down() {
        let surface = RecordingSurface::default();
        let mut events = ScriptedInteractions::drag(Point::new(10, 20), Point::new(110, 70));

        let outcome = run_selection(&surface, &mut events, RegionSelector::new(viewport()))
            .await
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Selected(SelectionRect::new(10, 20, 100, 50)));
        let calls = surface.calls.lock().clone();
        assert_eq!(calls.first().map(String::as_str), Some("show"));
        assert_eq!(calls.last().map(String::as_str), Some("remove"));
        assert!(calls.contains(&"draw 10 20 100 50".to_string()));
    }

    #[tokio::test]
    async fn test_run_selection_escape_removes_overlay() {
        let surface = RecordingSurface::default();
        let mut events = ScriptedInteractions::new([
            UiEvent::PointerDown { x: 10, y: 10 },
            UiEvent::PointerMove { x: 60, y: 60 },
            UiEvent::Escape,
        ]);

        let outcome = run_selection(&surface, &mut events, RegionSelector::new(viewport()))
            .await
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Cancelled);
        assert_eq!(surface.calls.lock().last().map(String::as_str), Some("remove"));
    }

    #[test]
    fn test_crop_matches_source_region() {
        let mut raster = RgbaImage::new(200, 100);
        for (x, y, px) in raster.enumerate_pixels_mut() {
            *px = Rgba([x as u8, y as u8, 7, 255]);
        }
        let source = CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster.clone())).unwrap();

        let out = crop(&source, &SelectionRect::new(10, 20, 100, 50), 1.0).unwrap();
        assert_eq!((out.width, out.height), (100, 50));

        let cropped = out.decode().unwrap().to_rgba8();
        for (x, y, px) in cropped.enumerate_pixels() {
            assert_eq!(px, raster.get_pixel(x + 10, y + 20));
        }
    }

    #[test]
    fn test_crop_outside_source_fails() {
        let raster = RgbaImage::new(50, 50);
        let source = CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster)).unwrap();
        assert!(crop(&source, &SelectionRect::new(60, 60, 10, 10), 1.0).is_err());
    }
}
