//! Per-page session state
//!
//! Each page context (a browser target) gets one [`PageSession`], created on
//! first use and reset when the page navigates or closes. The session is the
//! single owner of whatever UI the core has on that page: a capture claims
//! it with a [`PageLease`], and a new claim revokes the old lease and waits
//! for that capture to take its selector or overlay down first.

use crate::agent::{InteractionSource, PageAgent, UiEvent};
use crate::overlay::OverlayHandle;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

/// Identifies a page context (a CDP target id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(String);

impl ContextId {
    /// Wrap a target id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exclusive claim on a page, held by one running capture.
///
/// The lease is revoked when another capture claims the page or the session
/// is reset. Dropping it tells the claimant the page is free.
#[derive(Debug)]
pub struct PageLease {
    id: u64,
    revoked: watch::Receiver<bool>,
}

impl PageLease {
    /// Whether the page has been handed to someone else
    pub fn is_revoked(&self) -> bool {
        *self.revoked.borrow() || self.revoked.has_changed().is_err()
    }

    /// Resolves once the lease is revoked
    pub async fn revoked(&mut self) {
        let _ = self.revoked.wait_for(|revoked| *revoked).await;
    }
}

struct PageOwner {
    id: u64,
    revoke: watch::Sender<bool>,
}

impl PageOwner {
    fn is_active(&self) -> bool {
        !self.revoke.is_closed()
    }

    async fn revoke(self) {
        self.revoke.send_replace(true);
        self.revoke.closed().await;
    }
}

/// UI a new claim has to end before it owns the page
#[must_use = "the previous owner keeps the page until the handover completes"]
pub struct Handover {
    previous: Option<PageOwner>,
    parked: Option<OverlayHandle<dyn PageAgent>>,
}

impl Handover {
    /// Revoke the previous lease, wait for its capture to clean up, then tear
    /// down any parked overlay.
    ///
    /// Never call this while holding the session lock: the previous owner may
    /// need it to finish.
    pub async fn complete(self) {
        if let Some(previous) = self.previous {
            if previous.is_active() {
                debug!(lease = previous.id, "Revoking page lease");
            }
            previous.revoke().await;
        }
        if let Some(mut overlay) = self.parked {
            overlay.teardown().await;
        }
    }
}

/// UI state the core holds on one page
#[derive(Default)]
pub struct PageSession {
    agent_installed: bool,
    next_lease: u64,
    owner: Option<PageOwner>,
    overlay: Option<OverlayHandle<dyn PageAgent>>,
}

impl PageSession {
    /// Whether the in-page agent script has been installed
    pub fn agent_installed(&self) -> bool {
        self.agent_installed
    }

    /// Record that the in-page agent script is installed
    pub fn mark_agent_installed(&mut self) {
        self.agent_installed = true;
    }

    /// Whether a capture currently holds the page
    pub fn is_claimed(&self) -> bool {
        self.owner.as_ref().is_some_and(PageOwner::is_active)
    }

    /// Whether a pinned overlay is parked on the page
    pub fn has_overlay(&self) -> bool {
        self.overlay.as_ref().is_some_and(|o| o.is_mounted())
    }

    /// Take the page for a new capture.
    ///
    /// The returned [`Handover`] must be completed, outside the session lock,
    /// before the page is touched.
    pub fn claim(&mut self) -> (PageLease, Handover) {
        self.next_lease += 1;
        let (revoke, revoked) = watch::channel(false);
        let lease = PageLease {
            id: self.next_lease,
            revoked,
        };

        let previous = self.owner.replace(PageOwner {
            id: lease.id,
            revoke,
        });
        let handover = Handover {
            previous,
            parked: self.overlay.take(),
        };
        (lease, handover)
    }

    /// Park a still-mounted overlay once its input has ended.
    ///
    /// Hands the overlay back when `lease` no longer owns the page; the
    /// caller tears it down.
    pub fn park_overlay(
        &mut self,
        lease: &PageLease,
        overlay: OverlayHandle<dyn PageAgent>,
    ) -> Option<OverlayHandle<dyn PageAgent>> {
        match &self.owner {
            Some(owner) if owner.id == lease.id && !lease.is_revoked() => {
                self.overlay = Some(overlay);
                None
            }
            _ => Some(overlay),
        }
    }

    /// The parked overlay, if any
    pub fn overlay_mut(&mut self) -> Option<&mut OverlayHandle<dyn PageAgent>> {
        self.overlay.as_mut()
    }

    /// Forget the agent and hand back everything the page was showing
    pub fn reset(&mut self) -> Handover {
        self.agent_installed = false;
        Handover {
            previous: self.owner.take(),
            parked: self.overlay.take(),
        }
    }
}

/// Input from `inner` that ends as soon as the lease is revoked
pub struct LeasedEvents<'a> {
    inner: &'a mut dyn InteractionSource,
    lease: PageLease,
}

impl<'a> LeasedEvents<'a> {
    /// Wrap `inner` for the holder of `lease`
    pub fn new(inner: &'a mut dyn InteractionSource, lease: PageLease) -> Self {
        Self { inner, lease }
    }

    /// The lease input is read under
    pub fn lease(&self) -> &PageLease {
        &self.lease
    }

    /// Whether input ended because the page was taken away
    pub fn is_revoked(&self) -> bool {
        self.lease.is_revoked()
    }
}

#[async_trait]
impl<'a> InteractionSource for LeasedEvents<'a> {
    async fn next_event(&mut self) -> Option<UiEvent> {
        if self.lease.is_revoked() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.lease.revoked() => None,
            event = self.inner.next_event() => event,
        }
    }
}

/// Sessions keyed by page context
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ContextId, Arc<Mutex<PageSession>>>>,
}

impl SessionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `context`, created on first use
    pub fn session(&self, context: &ContextId) -> Arc<Mutex<PageSession>> {
        if let Some(session) = self.sessions.read().get(context) {
            return session.clone();
        }

        self.sessions
            .write()
            .entry(context.clone())
            .or_insert_with(|| {
                debug!(%context, "Created page session");
                Arc::new(Mutex::new(PageSession::default()))
            })
            .clone()
    }

    /// Reset the session for `context` in place after the page navigated.
    ///
    /// Ends any running capture, tears down parked UI and forgets the agent,
    /// which the new document no longer has.
    pub async fn invalidate(&self, context: &ContextId) {
        let session = self.sessions.read().get(context).cloned();
        if let Some(session) = session {
            let handover = session.lock().await.reset();
            handover.complete().await;
            info!(%context, "Invalidated page session");
        }
    }

    /// Reset and forget the session for a closed page
    pub async fn remove(&self, context: &ContextId) {
        let removed = self.sessions.write().remove(context);
        if let Some(session) = removed {
            let handover = session.lock().await.reset();
            handover.complete().await;
            debug!(%context, "Removed page session");
        }
    }

    /// Number of tracked contexts
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no contexts are tracked
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
