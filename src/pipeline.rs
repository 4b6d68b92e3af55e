//! Capture entry point
//!
//! [`Pinshot::run`] takes a single [`CaptureMode`] and drives the rest:
//! region modes capture the viewport once, let the user select, crop, then
//! save or pin; full-page mode sweeps, stitches and presents the result.

use crate::agent::{InteractionSource, PageAgent};
use crate::capture::{CapturedImage, ImageFormat, ScrollSequencer};
use crate::config::PinshotConfig;
use crate::error::{CaptureError, Error, Result};
use crate::geometry::{SelectionRect, Size};
use crate::output::{screenshot_filename, OutputSink};
use crate::overlay::{build_overlay, OverlayCommand, OverlayHandle};
use crate::region::{crop, run_selection, RegionSelector, SelectionOutcome};
use crate::session::{LeasedEvents, PageLease, PageSession};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Select a region and save it to disk
    Save,
    /// Select a region and pin it on the page
    Pin,
    /// Capture the whole document
    FullPage,
}

impl std::str::FromStr for CaptureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "save" => Ok(CaptureMode::Save),
            "pin" => Ok(CaptureMode::Pin),
            "fullpage" => Ok(CaptureMode::FullPage),
            other => Err(Error::generic(format!("Unknown capture mode: {other}"))),
        }
    }
}

/// How a capture run ended
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Region saved to disk
    Saved(PathBuf),
    /// Overlay left pinned on the page
    Pinned,
    /// Overlay was pinned and then closed by the user
    Closed,
    /// Full-page capture saved and presented
    FullPage {
        /// Where the composite was saved
        path: PathBuf,
        /// Composite width in pixels
        width: u32,
        /// Composite height in pixels
        height: u32,
        /// Viewport captures taken
        slices: usize,
    },
    /// Escape pressed, or input ended before a selection
    Cancelled,
    /// Another capture claimed the page, or the page navigated away
    Superseded,
    /// Selection smaller than the minimum size
    Discarded,
}

enum Step {
    Done(CaptureOutcome),
    Retake,
}

enum Selection {
    Cropped {
        image: CapturedImage,
        rect: SelectionRect,
        viewport: Size,
        scale: f64,
    },
    Ended(CaptureOutcome),
}

/// Runs captures against one page
pub struct Pinshot {
    agent: Arc<dyn PageAgent>,
    session: Arc<Mutex<PageSession>>,
    sink: Arc<dyn OutputSink>,
    config: PinshotConfig,
}

impl Pinshot {
    /// Pipeline over `agent`, sharing `session` with anything else on the page
    pub fn new(
        agent: Arc<dyn PageAgent>,
        session: Arc<Mutex<PageSession>>,
        sink: Arc<dyn OutputSink>,
        config: PinshotConfig,
    ) -> Self {
        Self {
            agent,
            session,
            sink,
            config,
        }
    }

    /// Run one capture in `mode`, feeding user input from `events`.
    ///
    /// Retake repeats the capture in the same mode.
    #[instrument(skip(self, events))]
    pub async fn run(
        &self,
        mode: CaptureMode,
        events: &mut dyn InteractionSource,
    ) -> Result<CaptureOutcome> {
        loop {
            let step = match mode {
                CaptureMode::FullPage => self.full_page().await.map(Step::Done),
                CaptureMode::Save | CaptureMode::Pin => self.region(mode, events).await,
            };

            match step {
                Ok(Step::Done(outcome)) => {
                    info!(?outcome, "Capture finished");
                    return Ok(outcome);
                }
                Ok(Step::Retake) => info!("Retaking capture"),
                Err(e) => {
                    error!("Capture failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Claim the page, ending whatever capture or overlay held it before
    async fn claim(&self) -> PageLease {
        let (lease, handover) = self.session.lock().await.claim();
        handover.complete().await;
        lease
    }

    async fn region(&self, mode: CaptureMode, events: &mut dyn InteractionSource) -> Result<Step> {
        let lease = self.claim().await;
        let mut events = LeasedEvents::new(events, lease);

        let selection = self.select_and_crop(&mut events).await?;
        let (image, rect, viewport, scale) = match selection {
            Selection::Cropped {
                image,
                rect,
                viewport,
                scale,
            } => (image, rect, viewport, scale),
            Selection::Ended(_) if events.is_revoked() => {
                return Ok(Step::Done(CaptureOutcome::Superseded))
            }
            Selection::Ended(outcome) => return Ok(Step::Done(outcome)),
        };

        match mode {
            CaptureMode::Save => {
                let path = self.save(&image).await?;
                Ok(Step::Done(CaptureOutcome::Saved(path)))
            }
            _ => self.pin(image, &rect, viewport, scale, &mut events).await,
        }
    }

    async fn select_and_crop(&self, events: &mut dyn InteractionSource) -> Result<Selection> {
        let dims = self.agent.dimensions().await?;
        let viewport = Size::new(dims.viewport_width, dims.viewport_height);

        let source = self
            .agent
            .capture_visible()
            .await
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        let source = CapturedImage::from_png(source)?;

        let selector =
            RegionSelector::new(viewport).with_min_size(self.config.min_selection_px);
        let rect = match run_selection(self.agent.as_ref(), events, selector).await? {
            SelectionOutcome::Selected(rect) => rect,
            SelectionOutcome::Discarded => return Ok(Selection::Ended(CaptureOutcome::Discarded)),
            SelectionOutcome::Cancelled => return Ok(Selection::Ended(CaptureOutcome::Cancelled)),
        };

        Ok(Selection::Cropped {
            image: crop(&source, &rect, dims.device_pixel_ratio)?,
            rect,
            viewport,
            scale: dims.device_pixel_ratio,
        })
    }

    async fn pin(
        &self,
        image: CapturedImage,
        anchor: &SelectionRect,
        viewport: Size,
        scale: f64,
        events: &mut LeasedEvents<'_>,
    ) -> Result<Step> {
        let mut overlay = build_overlay(
            self.agent.clone(),
            image,
            anchor,
            viewport,
            scale,
            self.config.overlay.clone(),
        )
        .await?;

        while let Some(event) = events.next_event().await {
            let command = match overlay.dispatch(&event).await {
                Ok(command) => command,
                Err(e) if e.is_widget_local() => {
                    warn!("{}", e);
                    OverlayCommand::None
                }
                Err(e) => {
                    overlay.teardown().await;
                    return Err(e);
                }
            };

            match command {
                OverlayCommand::None => {}
                OverlayCommand::Save => self.save_pinned(&overlay).await,
                OverlayCommand::Closed => return Ok(Step::Done(CaptureOutcome::Closed)),
                OverlayCommand::Retake => return Ok(Step::Retake),
            }
        }

        let stale = if events.is_revoked() {
            Some(overlay)
        } else {
            self.session
                .lock()
                .await
                .park_overlay(events.lease(), overlay)
        };
        if let Some(mut overlay) = stale {
            info!("Page taken over, removing pinned overlay");
            overlay.teardown().await;
            return Ok(Step::Done(CaptureOutcome::Superseded));
        }
        Ok(Step::Done(CaptureOutcome::Pinned))
    }

    async fn save_pinned(&self, overlay: &OverlayHandle<dyn PageAgent>) {
        if let Err(e) = self.save(overlay.image()).await {
            warn!("Saving pinned image failed: {}", e);
            if let Err(toast) = self.agent.show_toast("Save failed").await {
                warn!("Failed to show toast: {}", toast);
            }
        }
    }

    async fn full_page(&self) -> Result<CaptureOutcome> {
        // Held for the whole sweep; a competing claim waits for it
        let _lease = self.claim().await;

        let agent = self.agent.as_ref();
        let capture = ScrollSequencer::new(agent, agent, self.config.sweep)
            .capture_full_page()
            .await?;

        let path = self.save(&capture.image).await?;
        if let Err(e) = self.sink.present(&capture.image).await {
            warn!("Results view unavailable: {}", e);
        }

        Ok(CaptureOutcome::FullPage {
            path,
            width: capture.image.width,
            height: capture.image.height,
            slices: capture.slice_count,
        })
    }

    async fn save(&self, image: &CapturedImage) -> Result<PathBuf> {
        let filename = screenshot_filename(Utc::now(), ImageFormat::Png);
        self.sink.save(image, &filename).await
    }
}
