//! Predictive tile prefetching.
//!
//! Keeps a deep-zoom viewer responsive by warming the tile cache ahead of
//! the user:
//!
//! ```text
//! viewport events ─► MotionTracker ─► (settle delay) ─► PrefetchPlanner
//!                                                            │ ranked candidates
//!                                                            ▼
//!                                        FetchScheduler ─► TileWarmer (≤ N in flight)
//! ```
//!
//! [`PrefetchEngine`] wires the pieces together and also fronts delivery
//! health and error classification for the viewer shell. Prefetch requests
//! are speculative: their failures are logged at debug level and never
//! reach the health tracker.

mod config;
mod engine;
mod error;
mod events;
mod motion;
mod planner;
mod scheduler;
mod settle;
mod viewport;

pub use config::{
    PartialPrefetchConfig, PrefetchConfig, DEFAULT_ADJACENT_PRIORITY, DEFAULT_ADJACENT_TILE_CAP,
    DEFAULT_DIRECTION_BIAS, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_PREDICTION_LOOKAHEAD_SECONDS,
    DEFAULT_PREFETCH_RADIUS, DEFAULT_SETTLE_DELAY_MS,
};
pub use engine::{PlanSummary, PrefetchEngine, PrefetchEngineBuilder};
pub use error::PrefetchError;
pub use events::{EngineEvent, EventBus, DEFAULT_EVENT_CAPACITY};
pub use motion::{MotionTracker, MAX_SAMPLE_GAP_MS};
pub use planner::{level_for_zoom, PlanInput, PrefetchCandidate, PrefetchPlanner};
pub use scheduler::{FetchScheduler, PrefetchStats};
pub use settle::SettleTimer;
pub use viewport::{SharedViewport, Viewport, ViewportState};

#[cfg(test)]
pub use scheduler::tests::DelayedWarmer;
