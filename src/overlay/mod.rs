//! Pinned overlays
//!
//! A cropped capture becomes a floating widget on the page: a header that
//! drags it, buttons (save, copy, close, retake, PiP), and a resize handle.
//! [`build_overlay`] mounts one and returns an [`OverlayHandle`]; everything
//! else about the widget's DOM stays inside the page surface.

mod pip;
mod widget;

pub use pip::{LiveSurfaceId, PipSession};
pub use widget::{OverlayConfig, OverlayWidget};

use crate::agent::UiEvent;
use crate::capture::CapturedImage;
use crate::error::{OverlayError, Result};
use crate::geometry::{Point, Rect, SelectionRect, Size};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Buttons on the pinned widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayAction {
    /// Save the image to disk
    Save,
    /// Copy the image to the clipboard
    Copy,
    /// Close the widget
    Close,
    /// Close the widget and capture again in the same mode
    Retake,
    /// Enter or leave picture-in-picture
    TogglePip,
}

/// Page-side rendering of a pinned widget
#[async_trait]
pub trait OverlaySurface: Send + Sync {
    /// Create the widget DOM showing `image` at `rect`
    async fn mount_overlay(
        &self,
        image: &CapturedImage,
        rect: &Rect,
        config: &OverlayConfig,
    ) -> Result<()>;

    /// Move/resize the widget DOM
    async fn update_overlay(&self, rect: &Rect) -> Result<()>;

    /// Remove the widget DOM
    async fn unmount_overlay(&self) -> Result<()>;

    /// Write `image` to the clipboard as an image MIME blob
    async fn write_clipboard(&self, image: &CapturedImage) -> Result<()>;

    /// Create a continuously rendered surface mirroring `image`
    async fn create_live_surface(&self, id: LiveSurfaceId, image: &CapturedImage) -> Result<()>;

    /// Present a live surface in picture-in-picture
    async fn enter_pip(&self, id: LiveSurfaceId) -> Result<()>;

    /// Close the picture-in-picture window
    async fn exit_pip(&self, id: LiveSurfaceId) -> Result<()>;

    /// Stop rendering a live surface and drop every reference to it
    async fn release_live_surface(&self, id: LiveSurfaceId) -> Result<()>;

    /// Show a short notice on the widget
    async fn show_toast(&self, message: &str) -> Result<()>;
}

/// What the caller should do after an event reached the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    /// Nothing further
    None,
    /// Save the widget's image
    Save,
    /// Widget closed and torn down
    Closed,
    /// Widget torn down; capture again in the same mode
    Retake,
}

/// Handle to a mounted widget
pub struct OverlayHandle<S: OverlaySurface + ?Sized> {
    surface: Arc<S>,
    image: CapturedImage,
    widget: OverlayWidget,
    pip: PipSession,
    mounted: bool,
}

/// Mount a widget for `image`, anchored near `anchor`.
///
/// `scale` is the image's pixels per CSS pixel.
#[instrument(skip(surface, image, config), fields(width = image.width, height = image.height))]
pub async fn build_overlay<S: OverlaySurface + ?Sized>(
    surface: Arc<S>,
    image: CapturedImage,
    anchor: &SelectionRect,
    viewport: Size,
    scale: f64,
    config: OverlayConfig,
) -> Result<OverlayHandle<S>> {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let content = Size::new(
        (image.width as f64 / scale).round() as u32,
        (image.height as f64 / scale).round() as u32,
    );
    let widget = OverlayWidget::new(content, anchor, viewport, config);

    surface
        .mount_overlay(&image, &widget.rect(), widget.config())
        .await
        .map_err(|e| OverlayError::SurfaceFailed(e.to_string()))?;
    info!(rect = ?widget.rect(), "Pinned overlay mounted");

    Ok(OverlayHandle {
        surface,
        image,
        widget,
        pip: PipSession::default(),
        mounted: true,
    })
}

impl<S: OverlaySurface + ?Sized> OverlayHandle<S> {
    /// The pinned image
    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    /// Current outer rectangle
    pub fn rect(&self) -> Rect {
        self.widget.rect()
    }

    /// Whether the widget is still on the page
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether a PiP window is showing
    pub fn is_pip_active(&self) -> bool {
        self.pip.is_active()
    }

    /// Move the widget
    pub async fn update_position(&mut self, position: Point) -> Result<()> {
        self.widget.set_position(position);
        self.sync().await
    }

    /// Resize the widget
    pub async fn resize(&mut self, size: Size) -> Result<()> {
        self.widget.set_size(size);
        self.sync().await
    }

    /// Remove the widget and release any PiP surface. Safe to call twice.
    pub async fn teardown(&mut self) {
        self.pip.exit(self.surface.as_ref(), true).await;
        if self.mounted {
            self.mounted = false;
            if let Err(e) = self.surface.unmount_overlay().await {
                warn!("Failed to unmount overlay: {}", e);
            }
            debug!("Pinned overlay torn down");
        }
    }

    /// Route one input event to the widget.
    ///
    /// Clipboard and PiP failures are shown as toasts and do not end the
    /// widget.
    pub async fn dispatch(&mut self, event: &UiEvent) -> Result<OverlayCommand> {
        if !self.mounted {
            return Ok(OverlayCommand::Closed);
        }

        match *event {
            UiEvent::HeaderDown { x, y } => self.widget.begin_drag(Point::new(x, y)),
            UiEvent::ResizeDown { x, y } => self.widget.begin_resize(Point::new(x, y)),
            UiEvent::PointerMove { x, y } => {
                if self.widget.pointer_move(Point::new(x, y)) {
                    self.sync().await?;
                }
            }
            UiEvent::PointerUp { .. } => self.widget.pointer_up(),
            UiEvent::HeaderDoubleClick => {
                self.widget.reset_size();
                self.sync().await?;
            }
            UiEvent::PipExited => self.pip.exit(self.surface.as_ref(), false).await,
            UiEvent::Action { action } => return self.act(action).await,
            UiEvent::PointerDown { .. } | UiEvent::Escape => {}
        }
        Ok(OverlayCommand::None)
    }

    async fn act(&mut self, action: OverlayAction) -> Result<OverlayCommand> {
        debug!(?action, "Overlay action");
        match action {
            OverlayAction::Save => Ok(OverlayCommand::Save),
            OverlayAction::Copy => {
                match self.surface.write_clipboard(&self.image).await {
                    Ok(()) => self.toast("Copied to clipboard").await,
                    Err(e) => {
                        let err = OverlayError::ClipboardWriteFailed(e.to_string());
                        warn!("{}", err);
                        self.toast("Copy failed").await;
                    }
                }
                Ok(OverlayCommand::None)
            }
            OverlayAction::TogglePip => {
                if !self.widget.config().pip {
                    return Ok(OverlayCommand::None);
                }
                if self.pip.is_active() {
                    self.pip.exit(self.surface.as_ref(), true).await;
                } else if let Err(e) = self.pip.enter(self.surface.as_ref(), &self.image).await {
                    warn!("{}", e);
                    self.toast("Picture-in-picture is not available").await;
                }
                Ok(OverlayCommand::None)
            }
            OverlayAction::Close => {
                self.teardown().await;
                Ok(OverlayCommand::Closed)
            }
            OverlayAction::Retake => {
                self.teardown().await;
                Ok(OverlayCommand::Retake)
            }
        }
    }

    async fn toast(&self, message: &str) {
        if let Err(e) = self.surface.show_toast(message).await {
            warn!("Failed to show toast: {}", e);
        }
    }

    async fn sync(&self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        self.surface
            .update_overlay(&self.widget.rect())
            .await
            .map_err(|e| OverlayError::SurfaceFailed(e.to_string()).into())
    }
}
