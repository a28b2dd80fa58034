//! Geometry value types in normalized image space.
//!
//! All positions are expressed as fractions of the full image extent, so
//! `(0.0, 0.0)` is the top-left corner and `(1.0, 1.0)` the bottom-right
//! corner on every pyramid level. Values are immutable; every operation that
//! "changes" a rectangle returns a new one.

use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A point (or vector) in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin, also used as the "no motion" velocity.
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two points.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns true if both components are exactly zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in normalized image space.
///
/// Stored as its left/top and right/bottom edges. A rectangle may extend
/// beyond `[0, 1]` after expansion; tile enumeration clamps it to the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    /// Create a rectangle from its origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    /// Create a rectangle of the given size centered on `center`.
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            width,
            height,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Grow the rectangle on every side by `factor` times its own size.
    ///
    /// A factor of 2.0 on a 0.1-wide rectangle adds 0.2 to the left and
    /// 0.2 to the right edge.
    pub fn expand(&self, factor: f64) -> Rect {
        let dx = self.width() * factor;
        let dy = self.height() * factor;
        Rect {
            left: self.left - dx,
            top: self.top - dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Extend only the edges that lead in the direction of `velocity`.
    ///
    /// Each axis is handled independently by the sign of its velocity
    /// component. The leading edge moves outward by `fraction` of `basis`'s
    /// size on that axis; the trailing edge is left alone.
    pub fn extend_towards(&self, velocity: Point, fraction: f64, basis: &Rect) -> Rect {
        let dx = basis.width() * fraction;
        let dy = basis.height() * fraction;
        let mut out = *self;

        if velocity.x > 0.0 {
            out.right += dx;
        } else if velocity.x < 0.0 {
            out.left -= dx;
        }

        if velocity.y > 0.0 {
            out.bottom += dy;
        } else if velocity.y < 0.0 {
            out.top -= dy;
        }

        out
    }

    /// Returns true if `point` lies inside or on the boundary.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}] - [{:.4}, {:.4}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// A tile grid cell at one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Pyramid level
    pub level: u32,
    /// Column index
    pub x: u32,
    /// Row index
    pub y: u32,
}

impl TileCoord {
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}:{}_{}", self.level, self.x, self.y)
    }
}

/// Dimensions of the tile grid at one level, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub columns: u32,
    pub rows: u32,
}

impl GridSize {
    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }
}
