//! Viewport motion tracking.
//!
//! Estimates the velocity of the viewport center from consecutive samples
//! and extrapolates it linearly. Velocity is expressed in normalized image
//! units per second.

use crate::coord::Point;

/// Samples further apart than this are treated as a fresh start.
pub const MAX_SAMPLE_GAP_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct VelocitySample {
    center: Point,
    timestamp_ms: u64,
}

/// Tracks the viewport center across successive viewport events.
#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    last: Option<VelocitySample>,
    velocity: Point,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the viewport center at `now_ms`.
    ///
    /// Velocity is recomputed only when the previous sample is strictly
    /// older than `now_ms` and less than [`MAX_SAMPLE_GAP_MS`] old; any
    /// other gap zeroes it. The sample is stored either way.
    pub fn on_sample(&mut self, center: Point, now_ms: u64) {
        self.velocity = match self.last {
            Some(prev) if now_ms > prev.timestamp_ms => {
                let dt_ms = now_ms - prev.timestamp_ms;
                if dt_ms < MAX_SAMPLE_GAP_MS {
                    (center - prev.center) * (1000.0 / dt_ms as f64)
                } else {
                    Point::ZERO
                }
            }
            _ => Point::ZERO,
        };

        self.last = Some(VelocitySample {
            center,
            timestamp_ms: now_ms,
        });
    }

    /// Linear extrapolation of the last center `ahead_seconds` into the future.
    ///
    /// Returns the origin if no sample has been recorded yet.
    pub fn predict(&self, ahead_seconds: f64) -> Point {
        match self.last {
            Some(sample) => sample.center + self.velocity * ahead_seconds,
            None => Point::ZERO,
        }
    }

    pub fn velocity(&self) -> Point {
        self.velocity
    }

    /// The most recently recorded center.
    pub fn last_center(&self) -> Option<Point> {
        self.last.map(|s| s.center)
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
