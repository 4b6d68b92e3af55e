//! Page-side seams of the core
//!
//! The core never touches a browser directly. It talks to a page through the
//! traits gathered here: [`PageAgent`] for everything that reads or mutates
//! the page, and [`InteractionSource`] for user input flowing back out.

use crate::capture::{PageDom, ViewportCapturer};
use crate::geometry::Point;
use crate::overlay::{OverlayAction, OverlaySurface};
use crate::region::SelectionSurface;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Everything the pipeline needs from one page
pub trait PageAgent: ViewportCapturer + PageDom + SelectionSurface + OverlaySurface {}

impl<T> PageAgent for T where T: ViewportCapturer + PageDom + SelectionSurface + OverlaySurface {}

/// A user input event raised inside the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// Primary button pressed on the selection overlay
    PointerDown {
        /// Viewport x
        x: i32,
        /// Viewport y
        y: i32,
    },
    /// Pointer moved anywhere in the document
    PointerMove {
        /// Viewport x
        x: i32,
        /// Viewport y
        y: i32,
    },
    /// Primary button released anywhere in the document
    PointerUp {
        /// Viewport x
        x: i32,
        /// Viewport y
        y: i32,
    },
    /// Escape key
    Escape,
    /// Primary button pressed on the pinned widget's header
    HeaderDown {
        /// Viewport x
        x: i32,
        /// Viewport y
        y: i32,
    },
    /// Primary button pressed on the pinned widget's resize handle
    ResizeDown {
        /// Viewport x
        x: i32,
        /// Viewport y
        y: i32,
    },
    /// Double click on the pinned widget's header
    HeaderDoubleClick,
    /// A widget button was clicked
    Action {
        /// Which button
        action: OverlayAction,
    },
    /// The platform closed the picture-in-picture window
    PipExited,
}

/// A stream of user input events
#[async_trait]
pub trait InteractionSource: Send {
    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> Option<UiEvent>;
}

/// Replays a fixed list of events
#[derive(Debug, Default, Clone)]
pub struct ScriptedInteractions {
    events: VecDeque<UiEvent>,
}

impl ScriptedInteractions {
    /// Replay `events` in order
    pub fn new(events: impl IntoIterator<Item = UiEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// A press at `from`, a move to `to`, and a release there
    pub fn drag(from: Point, to: Point) -> Self {
        Self::new([
            UiEvent::PointerDown { x: from.x, y: from.y },
            UiEvent::PointerMove { x: to.x, y: to.y },
            UiEvent::PointerUp { x: to.x, y: to.y },
        ])
    }

    /// Append more events
    pub fn then(mut self, events: impl IntoIterator<Item = UiEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Events not yet replayed
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl InteractionSource for ScriptedInteractions {
    async fn next_event(&mut self) -> Option<UiEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let ev: UiEvent = serde_json::from_str(r#"{"type":"pointerDown","x":3,"y":4}"#).unwrap();
        assert_eq!(ev, UiEvent::PointerDown { x: 3, y: 4 });

        let ev: UiEvent = serde_json::from_str(r#"{"type":"escape"}"#).unwrap();
        assert_eq!(ev, UiEvent::Escape);

        let ev: UiEvent =
            serde_json::from_str(r#"{"type":"action","action":"togglePip"}"#).unwrap();
        assert_eq!(ev, UiEvent::Action { action: OverlayAction::TogglePip });
    }

    #[tokio::test]
    async fn test_scripted_drag() {
        let mut source = ScriptedInteractions::drag(Point::new(0, 0), Point::new(5, 5))
            .then([UiEvent::Escape]);
        assert_eq!(source.remaining(), 4);

        assert!(matches!(source.next_event().await, Some(UiEvent::PointerDown { .. })));
        assert!(matches!(source.next_event().await, Some(UiEvent::PointerMove { .. })));
        assert!(matches!(source.next_event().await, Some(UiEvent::PointerUp { .. })));
        assert_eq!(source.next_event().await, Some(UiEvent::Escape));
        assert_eq!(source.next_event().await, None);
    }
}
