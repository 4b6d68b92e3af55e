//! Pinned widget geometry: placement, drag and resize

use crate::geometry::{Point, Rect, SelectionRect, Size};
use serde::{Deserialize, Serialize};

/// Pinned widget behaviour and metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Header drags the widget
    pub draggable: bool,
    /// Corner handle resizes the widget
    pub resizable: bool,
    /// Offer a picture-in-picture button
    pub pip: bool,
    /// Keep the widget inside the viewport while dragging/resizing
    pub clamp_to_viewport: bool,
    /// Smallest widget size
    pub min_size: Size,
    /// Height of the header strip
    pub header_height: u32,
    /// Distance kept from the viewport edge when falling back to a corner
    pub margin: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            draggable: true,
            resizable: true,
            pip: true,
            clamp_to_viewport: true,
            min_size: Size::new(120, 80),
            header_height: 32,
            margin: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Idle,
    Dragging { grab: Point },
    Resizing { start: Point, start_size: Size },
}

/// Position and size of a pinned widget, plus any gesture in progress
#[derive(Debug, Clone)]
pub struct OverlayWidget {
    position: Point,
    size: Size,
    default_size: Size,
    viewport: Size,
    config: OverlayConfig,
    gesture: Gesture,
}

impl OverlayWidget {
    /// Lay out a widget for an image of `content` CSS pixels cut from `anchor`.
    ///
    /// The widget sits at the selection's top-left when it fits there, and in
    /// the top-right corner otherwise.
    pub fn new(content: Size, anchor: &SelectionRect, viewport: Size, config: OverlayConfig) -> Self {
        let size = initial_size(content, viewport, &config);
        let position = place(anchor, size, viewport, config.margin);
        Self {
            position,
            size,
            default_size: size,
            viewport,
            config,
            gesture: Gesture::Idle,
        }
    }

    /// Top-left corner
    pub fn position(&self) -> Point {
        self.position
    }

    /// Outer size including the header
    pub fn size(&self) -> Size {
        self.size
    }

    /// Size restored by a header double-click
    pub fn default_size(&self) -> Size {
        self.default_size
    }

    /// Outer rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.size.width, self.size.height)
    }

    /// Behaviour flags
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Whether a drag or resize is in progress
    pub fn is_tracking(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// Pointer pressed on the header
    pub fn begin_drag(&mut self, pointer: Point) {
        if self.config.draggable {
            self.gesture = Gesture::Dragging {
                grab: Point::new(pointer.x - self.position.x, pointer.y - self.position.y),
            };
        }
    }

    /// Pointer pressed on the resize handle
    pub fn begin_resize(&mut self, pointer: Point) {
        if self.config.resizable {
            self.gesture = Gesture::Resizing {
                start: pointer,
                start_size: self.size,
            };
        }
    }

    /// Pointer moved; returns whether the geometry changed
    pub fn pointer_move(&mut self, pointer: Point) -> bool {
        let before = self.rect();
        match self.gesture {
            Gesture::Idle => return false,
            Gesture::Dragging { grab } => {
                self.set_position(Point::new(pointer.x - grab.x, pointer.y - grab.y));
            }
            Gesture::Resizing { start, start_size } => {
                let width = start_size.width as i64 + (pointer.x - start.x) as i64;
                let height = start_size.height as i64 + (pointer.y - start.y) as i64;
                self.set_size(Size::new(
                    width.clamp(0, u32::MAX as i64) as u32,
                    height.clamp(0, u32::MAX as i64) as u32,
                ));
            }
        }
        self.rect() != before
    }

    /// Pointer released; ends any gesture
    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Move the widget, clamped to the viewport when configured
    pub fn set_position(&mut self, position: Point) {
        self.position = if self.config.clamp_to_viewport {
            clamp_position(position, self.size, self.viewport)
        } else {
            position
        };
    }

    /// Resize the widget, never below the minimum size
    pub fn set_size(&mut self, size: Size) {
        let mut size = size.max(self.config.min_size);
        if self.config.clamp_to_viewport {
            let room_w = (self.viewport.width as i64 - self.position.x as i64).max(0) as u32;
            let room_h = (self.viewport.height as i64 - self.position.y as i64).max(0) as u32;
            size.width = size.width.min(room_w.max(self.config.min_size.width));
            size.height = size.height.min(room_h.max(self.config.min_size.height));
        }
        self.size = size;
    }

    /// Back to the initial size
    pub fn reset_size(&mut self) {
        self.set_size(self.default_size);
    }
}

/// Image size plus header, shrunk to fit the viewport with aspect preserved
fn initial_size(content: Size, viewport: Size, config: &OverlayConfig) -> Size {
    let max_w = viewport.width.saturating_sub(config.margin * 2).max(1) as f64;
    let max_h = viewport
        .height
        .saturating_sub(config.margin * 2 + config.header_height)
        .max(1) as f64;

    let (w, h) = (content.width.max(1) as f64, content.height.max(1) as f64);
    let scale = (max_w / w).min(max_h / h).min(1.0);

    Size::new(
        (w * scale).round() as u32,
        (h * scale).round() as u32 + config.header_height,
    )
    .max(config.min_size)
}

fn place(anchor: &SelectionRect, size: Size, viewport: Size, margin: u32) -> Point {
    let at_anchor = Rect::new(anchor.left, anchor.top, size.width, size.height);
    if at_anchor.fits_within(viewport) {
        return anchor.origin();
    }

    let x = viewport.width as i64 - size.width as i64 - margin as i64;
    clamp_position(Point::new(x.max(0) as i32, margin as i32), size, viewport)
}

fn clamp_position(position: Point, size: Size, viewport: Size) -> Point {
    let max_x = (viewport.width as i64 - size.width as i64).max(0);
    let max_y = (viewport.height as i64 - size.height as i64).max(0);
    Point::new(
        (position.x as i64).clamp(0, max_x) as i32,
        (position.y as i64).clamp(0, max_y) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Size {
        Size::new(1280, 720)
    }

    #[test]
    fn test_anchored_at_selection() {
        let anchor = SelectionRect::new(100, 100, 300, 200);
        let widget = OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());

        assert_eq!(widget.position(), Point::new(100, 100));
        assert_eq!(widget.size(), Size::new(300, 232));
    }

    #[test]
    fn test_falls_back_to_corner_at_edge() {
        let anchor = SelectionRect::new(1000, 600, 280, 120);
        let widget = OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());

        assert!(widget.rect().fits_within(viewport()));
        assert_eq!(widget.position(), Point::new(1280 - 280 - 20, 20));
    }

    #[test]
    fn test_oversized_image_shrinks_to_fit() {
        let anchor = SelectionRect::new(0, 0, 1280, 720);
        let widget = OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());

        assert!(widget.rect().fits_within(viewport()));
        assert!(widget.size().width <= 1240);
    }

    #[test]
    fn test_drag_clamped_to_viewport() {
        let anchor = SelectionRect::new(100, 100, 200, 100);
        let mut widget =
            OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());

        widget.begin_drag(Point::new(110, 110));
        assert!(widget.pointer_move(Point::new(5000, 5000)));
        widget.pointer_up();

        let rect = widget.rect();
        assert!(rect.fits_within(viewport()));
        assert_eq!(rect.right(), 1280);
        assert_eq!(rect.bottom(), 720);
        assert!(!widget.is_tracking());
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let anchor = SelectionRect::new(100, 100, 200, 100);
        let mut widget =
            OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());

        widget.begin_drag(Point::new(150, 110));
        widget.pointer_move(Point::new(250, 310));
        assert_eq!(widget.position(), Point::new(200, 300));
    }

    #[test]
    fn test_resize_floor_and_reset() {
        let anchor = SelectionRect::new(100, 100, 400, 300);
        let mut widget =
            OverlayWidget::new(anchor.size(), &anchor, viewport(), OverlayConfig::default());
        let initial = widget.size();

        widget.begin_resize(Point::new(500, 432));
        widget.pointer_move(Point::new(0, 0));
        widget.pointer_up();
        assert_eq!(widget.size(), Size::new(120, 80));

        widget.reset_size();
        assert_eq!(widget.size(), initial);
    }

    #[test]
    fn test_disabled_drag_ignored() {
        let config = OverlayConfig {
            draggable: false,
            ..Default::default()
        };
        let anchor = SelectionRect::new(100, 100, 200, 100);
        let mut widget = OverlayWidget::new(anchor.size(), &anchor, viewport(), config);

        widget.begin_drag(Point::new(110, 110));
        assert!(!widget.pointer_move(Point::new(400, 400)));
        assert_eq!(widget.position(), Point::new(100, 100));
    }
}
