//! CDP-backed page agent
//!
//! [`CdpAgent`] implements every page-facing trait of the core by calling into
//! the in-page agent installed from [`scripts::AGENT_SCRIPT`], plus the CDP
//! screenshot command for viewport captures.

use crate::browser::scripts::{self, AGENT_SCRIPT};
use crate::browser::PageHandle;
use crate::capture::{
    CapturedImage, DocumentOverflow, ElementRef, InlineStyle, PageDimensions, PageDom,
    PositionedElement, ViewportCapturer,
};
use crate::error::{BrowserError, CaptureError, Error, Result};
use crate::geometry::{Rect, SelectionRect};
use crate::overlay::{LiveSurfaceId, OverlayConfig, OverlaySurface};
use crate::region::SelectionSurface;
use crate::session::PageSession;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace};

/// Page agent speaking CDP to one page
#[derive(Clone)]
pub struct CdpAgent {
    page: PageHandle,
    session: Arc<Mutex<PageSession>>,
}

impl CdpAgent {
    /// Agent for `page`, tracking installation in `session`
    pub fn new(page: PageHandle, session: Arc<Mutex<PageSession>>) -> Self {
        Self { page, session }
    }

    /// The page this agent drives
    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    /// The page's session
    pub fn session(&self) -> Arc<Mutex<PageSession>> {
        self.session.clone()
    }

    /// Install the in-page agent once per session.
    ///
    /// Must be called before any trait method, and again after the page
    /// navigates.
    #[instrument(skip(self), fields(context = %self.page.context()))]
    pub async fn install(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.agent_installed() {
            return Ok(());
        }

        self.page
            .inner()
            .evaluate(AGENT_SCRIPT)
            .await
            .map_err(|e| BrowserError::AgentInstallFailed(e.to_string()))?;
        session.mark_agent_installed();

        info!("Page agent installed");
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, method: &str, args: &[Value]) -> Result<T> {
        let js = scripts::call(method, args);
        trace!("{}", js);
        let result = self
            .page
            .inner()
            .evaluate(js.as_str())
            .await
            .map_err(|e| BrowserError::ScriptFailed(format!("{}: {}", method, e)))?;
        result
            .into_value()
            .map_err(|e| BrowserError::ScriptFailed(format!("{}: {}", method, e)).into())
    }

    async fn run(&self, method: &str, args: &[Value]) -> Result<()> {
        self.eval::<Value>(method, args).await.map(|_| ())
    }

    /// Evaluate with a simulated user gesture; clipboard and PiP refuse
    /// calls without one
    async fn run_with_gesture(&self, method: &str, args: &[Value]) -> Result<()> {
        let params = EvaluateParams::builder()
            .expression(scripts::call(method, args))
            .await_promise(true)
            .return_by_value(true)
            .user_gesture(true)
            .build()
            .map_err(Error::cdp)?;

        self.page
            .inner()
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::ScriptFailed(format!("{}: {}", method, e)))?;
        Ok(())
    }
}

#[async_trait]
impl ViewportCapturer for CdpAgent {
    #[instrument(skip(self))]
    async fn capture_visible(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .capture_beyond_viewport(false)
            .build();

        let data = self
            .page
            .inner()
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        debug!("Viewport captured: {} bytes", data.len());
        Ok(data)
    }
}

#[async_trait]
impl PageDom for CdpAgent {
    async fn dimensions(&self) -> Result<PageDimensions> {
        self.eval("dimensions", &[]).await
    }

    async fn scroll_offset(&self) -> Result<u32> {
        self.eval("scrollOffset", &[]).await
    }

    async fn scroll_to(&self, offset: u32) -> Result<u32> {
        self.eval("scrollTo", &[json!(offset)]).await
    }

    async fn document_overflow(&self) -> Result<DocumentOverflow> {
        self.eval("overflow", &[]).await
    }

    async fn set_document_overflow(&self, overflow: &DocumentOverflow) -> Result<()> {
        self.run("setOverflow", &[serde_json::to_value(overflow)?])
            .await
    }

    async fn positioned_elements(&self) -> Result<Vec<PositionedElement>> {
        self.eval("positioned", &[]).await
    }

    async fn set_element_style(&self, element: ElementRef, style: &InlineStyle) -> Result<()> {
        self.run("setStyle", &[json!(element), serde_json::to_value(style)?])
            .await
    }

    async fn release_elements(&self) -> Result<()> {
        self.run("release", &[]).await
    }
}

#[async_trait]
impl SelectionSurface for CdpAgent {
    async fn show_selection_overlay(&self) -> Result<()> {
        self.run("showSelection", &[]).await
    }

    async fn draw_selection(&self, rect: &SelectionRect) -> Result<()> {
        self.run("drawSelection", &[serde_json::to_value(rect)?]).await
    }

    async fn remove_selection_overlay(&self) -> Result<()> {
        self.run("removeSelection", &[]).await
    }
}

#[async_trait]
impl OverlaySurface for CdpAgent {
    async fn mount_overlay(
        &self,
        image: &CapturedImage,
        rect: &Rect,
        config: &OverlayConfig,
    ) -> Result<()> {
        self.run(
            "mount",
            &[
                json!(image.to_data_url()),
                serde_json::to_value(rect)?,
                serde_json::to_value(config)?,
            ],
        )
        .await
    }

    async fn update_overlay(&self, rect: &Rect) -> Result<()> {
        self.run("update", &[serde_json::to_value(rect)?]).await
    }

    async fn unmount_overlay(&self) -> Result<()> {
        self.run("unmount", &[]).await
    }

    async fn write_clipboard(&self, image: &CapturedImage) -> Result<()> {
        self.run_with_gesture("clipboard", &[json!(image.to_data_url())])
            .await
    }

    async fn create_live_surface(&self, id: LiveSurfaceId, image: &CapturedImage) -> Result<()> {
        self.run_with_gesture("createLive", &[json!(id), json!(image.to_data_url())])
            .await
    }

    async fn enter_pip(&self, id: LiveSurfaceId) -> Result<()> {
        self.run_with_gesture("enterPip", &[json!(id)]).await
    }

    async fn exit_pip(&self, id: LiveSurfaceId) -> Result<()> {
        self.run("exitPip", &[json!(id)]).await
    }

    async fn release_live_surface(&self, id: LiveSurfaceId) -> Result<()> {
        self.run("releaseLive", &[json!(id)]).await
    }

    async fn show_toast(&self, message: &str) -> Result<()> {
        self.run("toast", &[json!(message)]).await
    }
}
