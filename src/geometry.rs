//! Viewport-relative geometry shared by the selector and the overlay

use serde::{Deserialize, Serialize};

/// A point in CSS pixels relative to the viewport's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
}

impl Point {
    /// Create a point
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Size {
    /// Create a size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Component-wise maximum
    pub fn max(self, other: Size) -> Size {
        Size::new(self.width.max(other.width), self.height.max(other.height))
    }

    /// Zero in either dimension
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle; the selection rectangle of a drag gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// The rectangle a user drags out over the captured viewport
pub type SelectionRect = Rect;

impl Rect {
    /// Create a rectangle
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Bounding box of two corners, in whichever direction they were dragged
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    /// Top-left corner
    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Width and height
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Intersection with `(0, 0, bounds)`, or `None` when nothing is left
    pub fn clamp_to(&self, bounds: Size) -> Option<Rect> {
        let left = (self.left as i64).max(0);
        let top = (self.top as i64).max(0);
        let right = self.right().min(bounds.width as i64);
        let bottom = self.bottom().min(bounds.height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    /// Whether this rectangle lies entirely inside `(0, 0, bounds)`
    pub fn fits_within(&self, bounds: Size) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right() <= bounds.width as i64
            && self.bottom() <= bounds.height as i64
    }

    /// Scale every edge by `factor`, rounding to whole pixels
    pub fn scaled(&self, factor: f64) -> Rect {
        if (factor - 1.0).abs() < f64::EPSILON {
            return *self;
        }
        let left = (self.left as f64 * factor).round();
        let top = (self.top as f64 * factor).round();
        let right = (self.right() as f64 * factor).round();
        let bottom = (self.bottom() as f64 * factor).round();
        Rect::new(
            left as i32,
            top as i32,
            (right - left).max(0.0) as u32,
            (bottom - top).max(0.0) as u32,
        )
    }
}
