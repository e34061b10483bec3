/// Pixel geometry shared by every detection stage.
///
/// All coordinates are frame coordinates (origin top-left). Signed integers
/// are used so that derived regions can temporarily extend past the frame
/// before being clamped.
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by an offset
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle `{x, y, width, height}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Full-frame rectangle for an image of the given size
    pub fn of_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Build a rectangle from `[x, y, w, h]` fractions of a frame
    pub fn from_fractions(frame_width: u32, frame_height: u32, fractions: [f64; 4]) -> Self {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        Self::new(
            (fw * fractions[0]) as i32,
            (fh * fractions[1]) as i32,
            (fw * fractions[2]) as i32,
            (fh * fractions[3]) as i32,
        )
    }

    /// Square-ish window of `radius` pixels around `center`, widened by
    /// `extra_width`/`extra_height` so a template anchored at `center` fits.
    pub fn around(center: Point, radius: i32, extra_width: i32, extra_height: i32) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            2 * radius + extra_width,
            2 * radius + extra_height,
        )
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// True when the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Check if a point is inside the rectangle
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Inclusive pixel range `(top_left, bottom_right)`, or `None` when empty
    pub fn pixel_range(&self) -> Option<(Point, Point)> {
        if self.is_empty() {
            return None;
        }
        Some((
            self.origin(),
            Point::new(self.right() - 1, self.bottom() - 1),
        ))
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::new(x, y, right - x, bottom - y);
        (!rect.is_empty()).then_some(rect)
    }

    /// Clamp to a `width` x `height` frame, `None` if nothing remains
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersect(&Rect::of_size(width, height))
    }
}
