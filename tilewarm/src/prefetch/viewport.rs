//! Viewport capability.

use parking_lot::Mutex;

use crate::coord::{Point, Rect};

/// Read-only view of the image viewer's current viewport.
///
/// All coordinates are normalized image space: `(0, 0)` is the top-left and
/// `(1, 1)` the bottom-right corner of the full image. Implementations must
/// be cheap and non-blocking; they are called from viewport event handlers.
pub trait Viewport: Send + Sync {
    /// Center of the visible region.
    fn center(&self) -> Point;

    /// Visible region.
    fn bounds(&self) -> Rect;

    /// Rendered screen pixels per full-resolution image pixel.
    fn zoom(&self) -> f64;
}

/// Snapshot of a viewport's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub bounds: Rect,
    pub zoom: f64,
}

impl ViewportState {
    pub fn new(bounds: Rect, zoom: f64) -> Self {
        Self { bounds, zoom }
    }
}

/// A [`Viewport`] whose state is set from outside.
///
/// Used by hosts that push viewport updates rather than expose a live
/// widget, such as the command-line driver.
#[derive(Debug)]
pub struct SharedViewport {
    state: Mutex<ViewportState>,
}

impl SharedViewport {
    pub fn new(bounds: Rect, zoom: f64) -> Self {
        Self {
            state: Mutex::new(ViewportState::new(bounds, zoom)),
        }
    }

    /// Replace the current viewport state.
    pub fn set(&self, bounds: Rect, zoom: f64) {
        *self.state.lock() = ViewportState::new(bounds, zoom);
    }

    pub fn snapshot(&self) -> ViewportState {
        *self.state.lock()
    }
}

impl Viewport for SharedViewport {
    fn center(&self) -> Point {
        self.state.lock().bounds.center()
    }

    fn bounds(&self) -> Rect {
        self.state.lock().bounds
    }

    fn zoom(&self) -> f64 {
        self.state.lock().zoom
    }
}
