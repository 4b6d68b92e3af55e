//! Render-hazard suppression
//!
//! Before a sweep, scrollbars are hidden and every `fixed`/`sticky` element
//! is frozen in place as `absolute` so it does not repeat in every slice.
//! Header/nav-like chrome is hidden outright. Everything changed is recorded
//! in a [`RestoreRecord`] which [`RenderPrep::restore`] applies back exactly.

use crate::capture::PageDimensions;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Opaque handle to an element held by the page agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub u32);

/// Inline `position`/`display` values of an element; empty means unset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InlineStyle {
    /// Inline `position`
    pub position: String,
    /// Inline `display`
    pub display: String,
}

/// Inline `overflow` of `<html>` and `<body>`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOverflow {
    /// `document.documentElement.style.overflow`
    pub root: String,
    /// `document.body.style.overflow`
    pub body: String,
}

impl DocumentOverflow {
    /// Overflow that hides both scrollbars
    pub fn hidden() -> Self {
        Self {
            root: "hidden".to_string(),
            body: "hidden".to_string(),
        }
    }
}

/// An element whose computed position is `fixed` or `sticky`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedElement {
    /// Handle for later style updates
    pub element: ElementRef,
    /// Computed `position`
    pub computed_position: String,
    /// Upper-case tag name
    pub tag: String,
    /// Class list
    #[serde(default)]
    pub classes: Vec<String>,
    /// Inline styles at enumeration time
    pub inline: InlineStyle,
}

impl PositionedElement {
    /// Whether the element is viewport-anchored and would repeat per slice
    pub fn is_viewport_anchored(&self) -> bool {
        matches!(self.computed_position.as_str(), "fixed" | "sticky")
    }

    /// Structural header/nav heuristic
    pub fn is_header_like(&self) -> bool {
        matches!(self.tag.as_str(), "HEADER" | "NAV")
            || self.classes.iter().any(|c| c == "header" || c == "nav")
    }
}

/// Live page operations needed by the sweep
#[async_trait]
pub trait PageDom: Send + Sync {
    /// Snapshot viewport and document geometry
    async fn dimensions(&self) -> Result<PageDimensions>;

    /// Current vertical scroll offset
    async fn scroll_offset(&self) -> Result<u32>;

    /// Scroll vertically to `offset`, returning the offset the page settled on
    async fn scroll_to(&self, offset: u32) -> Result<u32>;

    /// Current inline overflow of the document
    async fn document_overflow(&self) -> Result<DocumentOverflow>;

    /// Replace the inline overflow of the document
    async fn set_document_overflow(&self, overflow: &DocumentOverflow) -> Result<()>;

    /// Every element whose computed position is `fixed` or `sticky`
    async fn positioned_elements(&self) -> Result<Vec<PositionedElement>>;

    /// Replace an element's inline `position`/`display`
    async fn set_element_style(&self, element: ElementRef, style: &InlineStyle) -> Result<()>;

    /// Drop any element handles the page agent holds
    async fn release_elements(&self) -> Result<()>;
}

/// Original state of one element changed by suppression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRestore {
    /// The element
    pub element: ElementRef,
    /// Inline styles before suppression
    pub original: InlineStyle,
}

/// Everything needed to reverse one [`RenderPrep::suppress`]
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "a RestoreRecord must be handed back to RenderPrep::restore"]
pub struct RestoreRecord {
    /// Document overflow before suppression, if it was changed
    pub overflow: Option<DocumentOverflow>,
    /// Scroll offset before suppression
    pub scroll_offset: Option<u32>,
    /// Changed elements, in the order they were changed
    pub elements: Vec<ElementRestore>,
}

impl RestoreRecord {
    /// Whether nothing was changed
    pub fn is_empty(&self) -> bool {
        self.overflow.is_none() && self.scroll_offset.is_none() && self.elements.is_empty()
    }
}

/// Summary of a restore pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreOutcome {
    /// Changes applied back successfully
    pub restored: usize,
    /// Changes that could not be applied back
    pub failed: usize,
}

/// Suppresses and restores render hazards on one page
pub struct RenderPrep<'a, D: PageDom + ?Sized> {
    dom: &'a D,
}

impl<'a, D: PageDom + ?Sized> RenderPrep<'a, D> {
    /// Create a controller for the given page
    pub fn new(dom: &'a D) -> Self {
        Self { dom }
    }

    /// Hide scrollbars and neutralize fixed/sticky elements.
    ///
    /// On failure the partial changes are rolled back before the error is
    /// returned, so a caller only ever holds complete records.
    #[instrument(skip(self))]
    pub async fn suppress(&self) -> Result<RestoreRecord> {
        let mut record = RestoreRecord::default();
        match self.suppress_into(&mut record).await {
            Ok(()) => {
                info!(
                    elements = record.elements.len(),
                    "Suppressed render hazards"
                );
                Ok(record)
            }
            Err(e) => {
                warn!("Render-hazard suppression failed, rolling back: {}", e);
                self.restore(record).await;
                Err(e)
            }
        }
    }

    async fn suppress_into(&self, record: &mut RestoreRecord) -> Result<()> {
        record.scroll_offset = Some(self.dom.scroll_offset().await?);

        let overflow = self.dom.document_overflow().await?;
        self.dom
            .set_document_overflow(&DocumentOverflow::hidden())
            .await?;
        record.overflow = Some(overflow);

        for el in self.dom.positioned_elements().await? {
            if !el.is_viewport_anchored() {
                continue;
            }

            let display = if el.is_header_like() {
                "none".to_string()
            } else {
                el.inline.display.clone()
            };
            let frozen = InlineStyle {
                position: "absolute".to_string(),
                display,
            };

            self.dom.set_element_style(el.element, &frozen).await?;
            debug!(tag = %el.tag, hidden = el.is_header_like(), "Froze positioned element");
            record.elements.push(ElementRestore {
                element: el.element,
                original: el.inline,
            });
        }

        Ok(())
    }

    /// Apply a record back. Best effort: failures are logged, never returned.
    #[instrument(skip(self, record), fields(elements = record.elements.len()))]
    pub async fn restore(&self, record: RestoreRecord) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();
        let RestoreRecord {
            overflow,
            scroll_offset,
            elements,
        } = record;

        for entry in elements.into_iter().rev() {
            match self.dom.set_element_style(entry.element, &entry.original).await {
                Ok(()) => outcome.restored += 1,
                Err(e) => {
                    warn!(element = entry.element.0, "Failed to restore element: {}", e);
                    outcome.failed += 1;
                }
            }
        }

        if let Some(overflow) = overflow {
            match self.dom.set_document_overflow(&overflow).await {
                Ok(()) => outcome.restored += 1,
                Err(e) => {
                    warn!("Failed to restore document overflow: {}", e);
                    outcome.failed += 1;
                }
            }
        }

        if let Some(offset) = scroll_offset {
            match self.dom.scroll_to(offset).await {
                Ok(_) => outcome.restored += 1,
                Err(e) => {
                    warn!("Failed to restore scroll offset {}: {}", offset, e);
                    outcome.failed += 1;
                }
            }
        }

        if let Err(e) = self.dom.release_elements().await {
            warn!("Failed to release element handles: {}", e);
        }

        debug!(
            restored = outcome.restored,
            failed = outcome.failed,
            "Render hazards restored"
        );
        outcome
    }
}
