//! User input from a live page
//!
//! The in-page agent reports input by calling the `pinshotEvent` runtime
//! binding with a JSON payload; [`CdpInteractions`] turns those binding calls
//! back into [`UiEvent`]s.

use crate::agent::{InteractionSource, UiEvent};
use crate::browser::scripts::EVENT_BINDING;
use crate::browser::PageHandle;
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

type BindingStream = Pin<Box<dyn Stream<Item = Arc<EventBindingCalled>> + Send>>;

/// Input events raised inside one page
pub struct CdpInteractions {
    calls: BindingStream,
    idle_timeout: Option<Duration>,
}

impl CdpInteractions {
    /// Register the event binding on `page` and start listening.
    ///
    /// Attach before installing the page agent so no early event is lost.
    #[instrument(skip(page), fields(context = %page.context()))]
    pub async fn attach(page: &PageHandle) -> Result<Self> {
        let calls = page
            .inner()
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;

        page.inner()
            .execute(AddBindingParams::new(EVENT_BINDING))
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;

        debug!("Listening for page events");
        Ok(Self {
            calls: Box::pin(calls),
            idle_timeout: None,
        })
    }

    /// End the stream after `timeout` without input
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    async fn next_call(&mut self) -> Option<Arc<EventBindingCalled>> {
        match self.idle_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.calls.next()).await {
                Ok(call) => call,
                Err(_) => {
                    debug!("No input for {:?}; closing event stream", timeout);
                    None
                }
            },
            None => self.calls.next().await,
        }
    }
}

/// Decode one binding payload
pub fn parse_event(payload: &str) -> Result<UiEvent> {
    Ok(serde_json::from_str(payload)?)
}

#[async_trait]
impl InteractionSource for CdpInteractions {
    async fn next_event(&mut self) -> Option<UiEvent> {
        while let Some(call) = self.next_call().await {
            if call.name != EVENT_BINDING {
                continue;
            }
            match parse_event(&call.payload) {
                Ok(event) => return Some(event),
                Err(e) => warn!("Ignoring malformed page event {:?}: {}", call.payload, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayAction;

    #[test]
    fn test_parse_page_payloads() {
        assert_eq!(
            parse_event(r#"{"type":"pointerDown","x":10,"y":20}"#).unwrap(),
            UiEvent::PointerDown { x: 10, y: 20 }
        );
        assert_eq!(
            parse_event(r#"{"type":"action","action":"togglePip"}"#).unwrap(),
            UiEvent::Action {
                action: OverlayAction::TogglePip
            }
        );
        assert_eq!(parse_event(r#"{"type":"pipExited"}"#).unwrap(), UiEvent::PipExited);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(parse_event(r#"{"type":"wheel","dy":3}"#).is_err());
        assert!(parse_event("not json").is_err());
    }
}
