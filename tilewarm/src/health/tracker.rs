//! Rolling failure-rate tracking for rendered tile requests.
//!
//! Only real (non-speculative) tile loads are recorded here; prefetch
//! outcomes never reach this tracker. The counters grow without decay over
//! the current observation window, and the caller decides when a window ends
//! by calling [`HealthTracker::reset`].

/// Point-in-time copy of the tracker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthState {
    /// Requests recorded in the current window.
    pub total_requests: u64,
    /// Failed requests recorded in the current window.
    pub failed_requests: u64,
}

impl HealthState {
    /// `failed_requests / total_requests`, or 0 when nothing was recorded.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }
}

/// Counts outcomes of rendered tile requests.
#[derive(Debug, Default)]
pub struct HealthTracker {
    state: HealthState,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one rendered tile request.
    pub fn record_request(&mut self, success: bool) {
        self.state.total_requests += 1;
        if !success {
            self.state.failed_requests += 1;
        }
    }

    /// Copy of the current counters.
    pub fn state(&self) -> HealthState {
        self.state
    }

    /// True when the failure rate is strictly above `threshold`.
    pub fn is_threshold_exceeded(&self, threshold: f64) -> bool {
        self.state.failure_rate() > threshold
    }

    /// Zero all counters, starting a new observation window.
    pub fn reset(&mut self) {
        self.state = HealthState::default();
    }
}
