//! Pinshot - Web Page Region Capture, Pinning and Full-Page Screenshots
//!
//! This crate captures web pages through a Chromium browser. It has three
//! capture modes:
//!
//! - **Save**: drag-select a region of the visible page and save it as PNG
//! - **Pin**: drag-select a region and pin it on the page as a floating
//!   widget that can be dragged, resized, copied, saved, or shown in
//!   picture-in-picture
//! - **Full page**: scroll through the whole document, capture each
//!   viewport, and stitch the slices into one image
//!
//! # Architecture
//!
//! ```text
//! CLI ──▶ Pinshot pipeline ──▶ PageAgent traits ◀── CdpAgent (browser)
//!              │                                       │
//!              ▼                                       ▼
//!     ┌─────────────────┐                     ┌────────────────┐
//!     │ RegionSelector  │                     │ in-page agent  │
//!     │ OverlayHandle   │ ◀── UiEvent ─────── │ (JS, binding)  │
//!     │ ScrollSequencer │                     └────────────────┘
//!     └────────┬────────┘
//!              ▼
//!       OutputSink: files, results tab, PNG/JPEG/PDF exports
//! ```
//!
//! The core (`capture`, `region`, `overlay`, `pipeline`) only talks to a page
//! through the traits in [`agent`], so it runs the same against a browser or
//! a test double.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pinshot::browser::{BrowserController, CdpInteractions, CdpResultsView};
//! use pinshot::output::DownloadDir;
//! use pinshot::{CaptureMode, Pinshot, PinshotConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PinshotConfig::default();
//!     let controller = BrowserController::with_config(config.browser.clone()).await?;
//!
//!     let page = controller.navigate("https://example.com").await?;
//!     let mut events = CdpInteractions::attach(&page).await?;
//!     let agent = controller.agent(&page);
//!     agent.install().await?;
//!
//!     let results = CdpResultsView::new(controller.new_page().await?, DownloadDir::new("."));
//!     let pinshot = Pinshot::new(
//!         Arc::new(agent.clone()),
//!         agent.session(),
//!         Arc::new(results),
//!         config,
//!     );
//!
//!     let outcome = pinshot.run(CaptureMode::FullPage, &mut events).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod agent;
pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod region;
pub mod session;

// Re-exports for convenience
pub use agent::{InteractionSource, PageAgent, ScriptedInteractions, UiEvent};
pub use browser::BrowserController;
pub use capture::{CapturedImage, ImageFormat, PageDimensions};
pub use config::PinshotConfig;
pub use error::{Error, Result};
pub use geometry::{Point, Rect, SelectionRect, Size};
pub use output::{DownloadDir, ImageExporter, OutputSink};
pub use pipeline::{CaptureMode, CaptureOutcome, Pinshot};
pub use session::{PageSession, SessionRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
