//! In-memory page used by the integration tests
//!
//! The document is `viewport.width` wide and `total_height` tall; every row
//! has its own colour so stitched output can be checked row by row. A fixed
//! `<header>` paints over the top of the viewport until it is frozen or
//! hidden.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::{Mutex, MutexGuard};
use pinshot::capture::{
    DocumentOverflow, ElementRef, InlineStyle, PageDimensions, PageDom, PositionedElement,
    ViewportCapturer,
};
use pinshot::error::{BrowserError, CaptureError, OverlayError};
use pinshot::overlay::{LiveSurfaceId, OverlayConfig, OverlaySurface};
use pinshot::region::SelectionSurface;
use pinshot::{CapturedImage, PinshotConfig, Rect, Result, SelectionRect, Size};
use std::collections::HashSet;
use std::path::PathBuf;

/// Rows covered by the fixed header
pub const HEADER_HEIGHT: u32 = 10;

/// Colour the fixed header paints
pub const HEADER_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Colour of document row `y`
pub fn row_color(y: u32) -> Rgba<u8> {
    Rgba([(y % 251) as u8, (y / 251 % 251) as u8, 0x40, 255])
}

/// Mutable page state
#[derive(Debug, Default)]
pub struct FakeState {
    pub scroll: u32,
    pub overflow: DocumentOverflow,
    pub header: InlineStyle,
    pub captures: usize,
    pub fail_capture_at: Option<usize>,
    pub refuse_clipboard: bool,
    pub refuse_pip: bool,
    pub selection_visible: bool,
    pub overlay: Option<Rect>,
    pub live_surfaces: HashSet<LiveSurfaceId>,
    pub clipboard_writes: usize,
    pub toasts: Vec<String>,
    pub log: Vec<String>,
}

/// A page implementing every page-facing trait of the core
pub struct FakePage {
    pub viewport: Size,
    pub total_height: u32,
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(width: u32, viewport_height: u32, total_height: u32) -> Self {
        Self {
            viewport: Size::new(width, viewport_height),
            total_height,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    pub fn logged(&self, entry: &str) -> usize {
        self.state().log.iter().filter(|e| *e == entry).count()
    }

    fn max_scroll(&self) -> u32 {
        self.total_height.saturating_sub(self.viewport.height)
    }

    fn header_painted(state: &FakeState) -> bool {
        state.header.position != "absolute" && state.header.display != "none"
    }
}

#[async_trait]
impl ViewportCapturer for FakePage {
    async fn capture_visible(&self) -> Result<Vec<u8>> {
        let mut state = self.state();
        let index = state.captures;
        state.captures += 1;
        state.log.push("capture".to_string());
        if state.fail_capture_at == Some(index) {
            return Err(CaptureError::Unavailable(format!("capture {} refused", index)).into());
        }

        let header = Self::header_painted(&state);
        let scroll = state.scroll;
        drop(state);

        let raster = RgbaImage::from_fn(self.viewport.width, self.viewport.height, |_, row| {
            let y = scroll + row;
            if header && row < HEADER_HEIGHT {
                HEADER_COLOR
            } else if y >= self.total_height {
                Rgba([255, 255, 255, 255])
            } else {
                row_color(y)
            }
        });
        Ok(CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster))?.data)
    }
}

#[async_trait]
impl PageDom for FakePage {
    async fn dimensions(&self) -> Result<PageDimensions> {
        Ok(PageDimensions::new(
            self.viewport.width,
            self.viewport.height,
            self.viewport.width,
            self.total_height,
        ))
    }

    async fn scroll_offset(&self) -> Result<u32> {
        Ok(self.state().scroll)
    }

    async fn scroll_to(&self, offset: u32) -> Result<u32> {
        let actual = offset.min(self.max_scroll());
        let mut state = self.state();
        state.scroll = actual;
        state.log.push(format!("scroll:{}", actual));
        Ok(actual)
    }

    async fn document_overflow(&self) -> Result<DocumentOverflow> {
        Ok(self.state().overflow.clone())
    }

    async fn set_document_overflow(&self, overflow: &DocumentOverflow) -> Result<()> {
        self.state().overflow = overflow.clone();
        Ok(())
    }

    async fn positioned_elements(&self) -> Result<Vec<PositionedElement>> {
        Ok(vec![PositionedElement {
            element: ElementRef(0),
            computed_position: "fixed".to_string(),
            tag: "HEADER".to_string(),
            classes: vec!["site-header".to_string()],
            inline: self.state().header.clone(),
        }])
    }

    async fn set_element_style(&self, element: ElementRef, style: &InlineStyle) -> Result<()> {
        if element != ElementRef(0) {
            return Err(BrowserError::ScriptFailed(format!("no element {}", element.0)).into());
        }
        self.state().header = style.clone();
        Ok(())
    }

    async fn release_elements(&self) -> Result<()> {
        self.state().log.push("release".to_string());
        Ok(())
    }
}

#[async_trait]
impl SelectionSurface for FakePage {
    async fn show_selection_overlay(&self) -> Result<()> {
        let mut state = self.state();
        state.selection_visible = true;
        state.log.push("selection:show".to_string());
        Ok(())
    }

    async fn draw_selection(&self, rect: &SelectionRect) -> Result<()> {
        self.state().log.push(format!(
            "selection:draw {},{},{},{}",
            rect.left, rect.top, rect.width, rect.height
        ));
        Ok(())
    }

    async fn remove_selection_overlay(&self) -> Result<()> {
        let mut state = self.state();
        state.selection_visible = false;
        state.log.push("selection:remove".to_string());
        Ok(())
    }
}

#[async_trait]
impl OverlaySurface for FakePage {
    async fn mount_overlay(
        &self,
        _image: &CapturedImage,
        rect: &Rect,
        _config: &OverlayConfig,
    ) -> Result<()> {
        let mut state = self.state();
        state.overlay = Some(*rect);
        state.log.push("overlay:mount".to_string());
        Ok(())
    }

    async fn update_overlay(&self, rect: &Rect) -> Result<()> {
        self.state().overlay = Some(*rect);
        Ok(())
    }

    async fn unmount_overlay(&self) -> Result<()> {
        let mut state = self.state();
        state.overlay = None;
        state.log.push("overlay:unmount".to_string());
        Ok(())
    }

    async fn write_clipboard(&self, _image: &CapturedImage) -> Result<()> {
        let mut state = self.state();
        if state.refuse_clipboard {
            return Err(OverlayError::ClipboardWriteFailed("permission denied".into()).into());
        }
        state.clipboard_writes += 1;
        Ok(())
    }

    async fn create_live_surface(&self, id: LiveSurfaceId, _image: &CapturedImage) -> Result<()> {
        self.state().live_surfaces.insert(id);
        Ok(())
    }

    async fn enter_pip(&self, _id: LiveSurfaceId) -> Result<()> {
        if self.state().refuse_pip {
            return Err(OverlayError::PipUnavailable("no user gesture".into()).into());
        }
        Ok(())
    }

    async fn exit_pip(&self, _id: LiveSurfaceId) -> Result<()> {
        self.state().log.push("pip:exit".to_string());
        Ok(())
    }

    async fn release_live_surface(&self, id: LiveSurfaceId) -> Result<()> {
        self.state().live_surfaces.remove(&id);
        Ok(())
    }

    async fn show_toast(&self, message: &str) -> Result<()> {
        self.state().toasts.push(message.to_string());
        Ok(())
    }
}

/// Config with no sweep delays
pub fn fast_config() -> PinshotConfig {
    PinshotConfig {
        sweep: pinshot::capture::SweepTiming::immediate(),
        ..PinshotConfig::default()
    }
}

/// A fresh, not yet created, temporary directory
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("pinshot-it-{}", uuid::Uuid::new_v4()))
}

/// Files in `dir`, or none when it does not exist
pub fn files_in(dir: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}
