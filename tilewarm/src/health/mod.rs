//! Delivery health and error classification.
//!
//! [`HealthTracker`] is a statistical gate over rendered (non-speculative)
//! tile loads: a single failure never degrades the viewer by itself. When
//! the gate trips, or when a control-plane / auth / metadata signal arrives,
//! [`classify`] turns the signal into an [`ErrorState`] carrying the
//! category's [`RecoveryPolicy`].

mod classifier;
mod tracker;

pub use classifier::{
    classify, supersession_signal, ErrorCategory, ErrorSignal, ErrorState, RecoveryAction,
    RecoveryPolicy,
};
pub use tracker::{HealthState, HealthTracker};

/// Failure rate above which rendered-tile delivery is considered degraded.
pub const DEFAULT_DEGRADED_THRESHOLD: f64 = 0.5;

/// Rendered tiles a window must contain before a breach is reported.
pub const DEFAULT_MIN_SAMPLES: u64 = 4;
