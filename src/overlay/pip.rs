//! Picture-in-picture for a static capture
//!
//! The platform's PiP facility only presents live video, so the captured
//! image is promoted to a one-frame looping live surface (a canvas capture
//! stream feeding a video element). The surface is owned here: created on
//! entry, released on exit, on refusal, and on widget teardown.

use crate::capture::CapturedImage;
use crate::error::{OverlayError, Result};
use crate::overlay::OverlaySurface;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifies one live surface inside the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveSurfaceId(Uuid);

impl LiveSurfaceId {
    /// A fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LiveSurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LiveSurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PiP state of one widget
#[derive(Debug, Default)]
pub struct PipSession {
    active: Option<LiveSurfaceId>,
}

impl PipSession {
    /// Whether a PiP window is showing
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Promote `image` to a live surface and present it in PiP.
    ///
    /// On refusal the surface is released again and `PipUnavailable` returned.
    pub async fn enter<S: OverlaySurface + ?Sized>(
        &mut self,
        surface: &S,
        image: &CapturedImage,
    ) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        let id = LiveSurfaceId::new();
        surface
            .create_live_surface(id, image)
            .await
            .map_err(|e| OverlayError::PipUnavailable(e.to_string()))?;

        if let Err(e) = surface.enter_pip(id).await {
            warn!(surface = %id, "Picture-in-picture refused: {}", e);
            if let Err(release) = surface.release_live_surface(id).await {
                warn!(surface = %id, "Failed to release live surface: {}", release);
            }
            return Err(OverlayError::PipUnavailable(e.to_string()).into());
        }

        info!(surface = %id, "Entered picture-in-picture");
        self.active = Some(id);
        Ok(())
    }

    /// Leave PiP (if the window is still open) and release the surface.
    ///
    /// `window_open` is false when the platform already closed the window.
    pub async fn exit<S: OverlaySurface + ?Sized>(&mut self, surface: &S, window_open: bool) {
        let Some(id) = self.active.take() else {
            return;
        };

        if window_open {
            if let Err(e) = surface.exit_pip(id).await {
                warn!(surface = %id, "Failed to exit picture-in-picture: {}", e);
            }
        }
        if let Err(e) = surface.release_live_surface(id).await {
            warn!(surface = %id, "Failed to release live surface: {}", e);
        }
        debug!(surface = %id, "Picture-in-picture released");
    }
}
