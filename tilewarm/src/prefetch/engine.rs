//! The prefetch engine: composition root for motion tracking, planning,
//! cache warming, delivery health and error classification.
//!
//! ```text
//! on_viewport_change ─┐
//! on_animation_settle ┴─► MotionTracker ─► SettleTimer ─► PrefetchPlanner ─► FetchScheduler
//!                                          (debounce)                         (warm requests)
//! record_tile_outcome ──► HealthTracker ──threshold──┐
//! report_signal ─────────────────────────────────────┴─► classify ─► EventBus (Recovery)
//! ```
//!
//! The engine is cheap to clone; clones share all state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::health::{
    self, ErrorSignal, ErrorState, HealthState, HealthTracker, RecoveryAction,
    DEFAULT_DEGRADED_THRESHOLD, DEFAULT_MIN_SAMPLES,
};
use crate::source::{TileSource, TileWarmer};

use super::config::{PartialPrefetchConfig, PrefetchConfig};
use super::error::PrefetchError;
use super::events::{EngineEvent, EventBus, DEFAULT_EVENT_CAPACITY};
use super::motion::MotionTracker;
use super::planner::{level_for_zoom, PlanInput, PrefetchCandidate, PrefetchPlanner};
use super::scheduler::{FetchScheduler, PrefetchStats};
use super::settle::SettleTimer;
use super::viewport::Viewport;

/// Outcome of one planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    /// Level treated as current.
    pub level: u32,
    /// Candidates on the current level.
    pub current_level: usize,
    /// Candidates on the adjacent levels.
    pub adjacent_levels: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.current_level + self.adjacent_levels
    }
}

/// Rendered-tile health plus recovery bookkeeping.
#[derive(Debug, Default)]
struct HealthGate {
    tracker: HealthTracker,
    /// A tile-failure decision was already published for this window.
    reported: bool,
    /// Consecutive windows that ended degraded.
    degraded_streak: u32,
}

impl HealthGate {
    /// Whether the window has enough evidence for a tile-failure decision.
    ///
    /// Needs `min_samples` recorded tiles and at least two failures, so a
    /// lone failed tile never reports on its own, whatever the threshold.
    fn breached(&self, threshold: f64, min_samples: u64) -> bool {
        let state = self.tracker.state();
        state.total_requests >= min_samples
            && state.failed_requests >= 2
            && self.tracker.is_threshold_exceeded(threshold)
    }
}

/// Candidates planned against one scheduler epoch, not yet queued.
struct PreparedPass {
    epoch: u64,
    candidates: Vec<PrefetchCandidate>,
    summary: PlanSummary,
}

struct EngineInner<V, W: TileWarmer + 'static> {
    viewport: Arc<V>,
    source: Mutex<Option<Arc<dyn TileSource>>>,
    config: Mutex<PrefetchConfig>,
    motion: Mutex<MotionTracker>,
    health: Mutex<HealthGate>,
    degraded_threshold: f64,
    min_samples: u64,
    scheduler: FetchScheduler<W>,
    settle: SettleTimer,
    events: EventBus,
    started: Instant,
    destroyed: AtomicBool,
}

/// Builder for [`PrefetchEngine`].
pub struct PrefetchEngineBuilder<V, W> {
    viewport: Arc<V>,
    warmer: W,
    config: PrefetchConfig,
    degraded_threshold: f64,
    min_samples: u64,
    event_capacity: usize,
    runtime: Option<Handle>,
}

impl<V: Viewport + 'static, W: TileWarmer + 'static> PrefetchEngineBuilder<V, W> {
    pub fn config(mut self, config: PrefetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Failure rate above which rendered-tile delivery is reported degraded.
    pub fn degraded_threshold(mut self, threshold: f64) -> Self {
        self.degraded_threshold = threshold;
        self
    }

    /// Rendered tiles a window must contain before a breach is reported.
    pub fn min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Runtime for warm requests and settle timers. Defaults to the
    /// runtime the builder is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<PrefetchEngine<V, W>, PrefetchError> {
        self.config.validate()?;
        if !(0.0..=1.0).contains(&self.degraded_threshold) {
            return Err(PrefetchError::invalid(
                "degraded_threshold",
                format!("must be in [0, 1], got {}", self.degraded_threshold),
            ));
        }
        if self.min_samples == 0 {
            return Err(PrefetchError::invalid("min_samples", "must be at least 1"));
        }

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| PrefetchError::NoRuntime)?,
        };

        let events = EventBus::new(self.event_capacity);
        let scheduler = FetchScheduler::new(
            Arc::new(self.warmer),
            self.config.max_concurrent_requests,
            events.clone(),
            runtime.clone(),
        );

        info!(
            enabled = self.config.enabled,
            radius = self.config.prefetch_radius,
            max_concurrent = self.config.max_concurrent_requests,
            settle_delay_ms = self.config.settle_delay_ms,
            "Prefetch engine started"
        );

        Ok(PrefetchEngine {
            inner: Arc::new(EngineInner {
                viewport: self.viewport,
                source: Mutex::new(None),
                config: Mutex::new(self.config),
                motion: Mutex::new(MotionTracker::new()),
                health: Mutex::new(HealthGate::default()),
                degraded_threshold: self.degraded_threshold,
                min_samples: self.min_samples,
                scheduler,
                settle: SettleTimer::new(runtime),
                events,
                started: Instant::now(),
                destroyed: AtomicBool::new(false),
            }),
        })
    }
}

/// Predictive tile delivery engine for one viewer.
pub struct PrefetchEngine<V, W: TileWarmer + 'static> {
    inner: Arc<EngineInner<V, W>>,
}

impl<V, W: TileWarmer + 'static> Clone for PrefetchEngine<V, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Viewport + 'static, W: TileWarmer + 'static> PrefetchEngine<V, W> {
    pub fn builder(viewport: Arc<V>, warmer: W) -> PrefetchEngineBuilder<V, W> {
        PrefetchEngineBuilder {
            viewport,
            warmer,
            config: PrefetchConfig::default(),
            degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            runtime: None,
        }
    }

    /// Create an engine with `config` on the current Tokio runtime.
    pub fn new(
        viewport: Arc<V>,
        warmer: W,
        config: PrefetchConfig,
    ) -> Result<Self, PrefetchError> {
        Self::builder(viewport, warmer).config(config).build()
    }

    // ==================== Configuration ====================

    /// Merge `partial` into the current options.
    ///
    /// The merged options are validated first; on error nothing changes.
    pub fn configure(&self, partial: PartialPrefetchConfig) -> Result<(), PrefetchError> {
        let updated = {
            let mut config = self.inner.config.lock();
            let merged = config.merged(&partial);
            merged.validate()?;
            *config = merged.clone();
            merged
        };

        self.inner
            .scheduler
            .set_max_concurrent(updated.max_concurrent_requests);
        if !updated.enabled {
            self.inner.settle.cancel();
        }

        debug!(?updated, "Prefetch configuration updated");
        Ok(())
    }

    pub fn config(&self) -> PrefetchConfig {
        self.inner.config.lock().clone()
    }

    // ==================== Viewer events ====================

    /// A new image was opened in the viewer.
    ///
    /// Drops all warmed state and pending work for the previous image.
    pub fn on_image_open(&self, source: Arc<dyn TileSource>) {
        if self.is_destroyed() {
            return;
        }

        self.inner.settle.cancel();
        self.inner.motion.lock().reset();

        let (width, height, max_level) =
            (source.image_width(), source.image_height(), source.max_level());
        {
            // Planning reads the source and epoch under this lock
            let mut current = self.inner.source.lock();
            self.inner.scheduler.reset();
            *current = Some(source);
        }

        info!(width, height, max_level, "Image opened");
        self.inner.events.publish(EngineEvent::ImageOpened {
            width,
            height,
            max_level,
        });
    }

    /// The viewport moved or zoomed.
    pub fn on_viewport_change(&self) {
        self.sample_and_arm();
    }

    /// A viewport animation came to rest.
    pub fn on_animation_settle(&self) {
        self.sample_and_arm();
    }

    fn sample_and_arm(&self) {
        if self.is_destroyed() {
            return;
        }

        let config = self.config();
        if !config.enabled {
            return;
        }

        let now_ms = self.inner.started.elapsed().as_millis() as u64;
        self.inner
            .motion
            .lock()
            .on_sample(self.inner.viewport.center(), now_ms);

        let weak = Arc::downgrade(&self.inner);
        self.inner.settle.arm(config.settle_delay(), async move {
            if let Some(inner) = weak.upgrade() {
                inner.plan_pass();
            }
        });
    }

    /// Run a planning pass immediately, bypassing the settle delay.
    ///
    /// Returns `None` when no pass ran: the engine is disabled, destroyed,
    /// or no image is open.
    pub fn plan_now(&self) -> Option<PlanSummary> {
        self.inner.settle.cancel();
        self.inner.plan_pass()
    }

    // ==================== Delivery health ====================

    /// Record the outcome of a rendered (non-speculative) tile load.
    ///
    /// Crossing the degraded threshold publishes one tile-failure recovery
    /// decision per observation window, once the window holds at least
    /// `min_samples` tiles and two failures.
    pub fn record_tile_outcome(&self, success: bool) {
        let breach = {
            let mut gate = self.inner.health.lock();
            gate.tracker.record_request(success);

            let breached = gate.breached(self.inner.degraded_threshold, self.inner.min_samples);
            if !gate.reported && breached {
                gate.reported = true;
                gate.degraded_streak += 1;
                Some((gate.tracker.state(), gate.degraded_streak))
            } else {
                None
            }
        };

        if let Some((state, streak)) = breach {
            let signal = ErrorSignal::HealthDegraded {
                state,
                threshold: self.inner.degraded_threshold,
            };
            let error = health::classify(&signal);
            let mut policy = error.policy();
            // Silent the first time; visible if the next window degrades too
            if streak > 1 {
                policy.action = RecoveryAction::UserRetry;
            }

            warn!(
                failed = state.failed_requests,
                total = state.total_requests,
                rate = state.failure_rate(),
                action = ?policy.action,
                "Tile delivery degraded"
            );
            self.inner
                .events
                .publish(EngineEvent::Recovery { error, policy });
        }
    }

    pub fn health(&self) -> HealthState {
        self.inner.health.lock().tracker.state()
    }

    /// Whether the rendered-tile failure rate is strictly above `threshold`.
    pub fn is_degraded(&self, threshold: f64) -> bool {
        self.inner
            .health
            .lock()
            .tracker
            .is_threshold_exceeded(threshold)
    }

    /// [`is_degraded`](Self::is_degraded) at the engine's configured threshold.
    pub fn is_degraded_default(&self) -> bool {
        self.is_degraded(self.inner.degraded_threshold)
    }

    /// Start a new observation window.
    pub fn reset_health(&self) {
        let previous = {
            let mut gate = self.inner.health.lock();
            let previous = gate.tracker.state();
            if !gate.reported {
                gate.degraded_streak = 0;
            }
            gate.reported = false;
            gate.tracker.reset();
            previous
        };

        debug!(
            failed = previous.failed_requests,
            total = previous.total_requests,
            "Health window reset"
        );
        self.inner
            .events
            .publish(EngineEvent::HealthReset { previous });
    }

    // ==================== Error classification ====================

    /// Classify a failure signal without publishing anything.
    pub fn classify(&self, signal: &ErrorSignal) -> ErrorState {
        health::classify(signal)
    }

    /// Classify a failure signal and publish the recovery decision.
    pub fn report_signal(&self, signal: &ErrorSignal) -> ErrorState {
        let error = health::classify(signal);
        let policy = error.policy();

        info!(
            category = %error.category,
            retryable = error.retryable,
            action = ?policy.action,
            "{}",
            error.message
        );
        self.inner.events.publish(EngineEvent::Recovery {
            error: error.clone(),
            policy,
        });
        error
    }

    // ==================== Introspection and lifecycle ====================

    pub fn stats(&self) -> PrefetchStats {
        self.inner.scheduler.stats()
    }

    /// Whether `url` is cached or being warmed for the current image.
    pub fn is_warmed(&self, url: &str) -> bool {
        self.inner.scheduler.is_warmed(url)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until no warm requests are pending or in flight.
    pub async fn wait_idle(&self) {
        self.inner.scheduler.wait_idle().await;
    }

    /// Stop all prefetch activity.
    ///
    /// Cancels the pending settle task, clears warmed and pending state, and
    /// makes completions of outstanding requests no-ops. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.settle.cancel();
        self.inner.scheduler.destroy();
        *self.inner.source.lock() = None;

        info!("Prefetch engine destroyed");
        self.inner.events.publish(EngineEvent::Destroyed);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl<V: Viewport, W: TileWarmer + 'static> EngineInner<V, W> {
    fn plan_pass(&self) -> Option<PlanSummary> {
        let pass = self.prepare_pass()?;
        self.commit_pass(pass)
    }

    /// Plan candidates for the open image without queueing them.
    fn prepare_pass(&self) -> Option<PreparedPass> {
        if self.destroyed.load(Ordering::SeqCst) {
            return None;
        }

        let config = self.config.lock().clone();
        if !config.enabled {
            return None;
        }

        let (source, epoch) = {
            let source = self.source.lock();
            (source.clone()?, self.scheduler.epoch())
        };

        let bounds = self.viewport.bounds();
        let level = level_for_zoom(source.as_ref(), self.viewport.zoom());

        let input = {
            let motion = self.motion.lock();
            PlanInput {
                bounds,
                level,
                velocity: motion.velocity(),
                predicted_center: match motion.last_center() {
                    Some(_) => motion.predict(config.prediction_lookahead_seconds),
                    None => bounds.center(),
                },
            }
        };

        let candidates = PrefetchPlanner::new(source.as_ref(), &config)
            .plan(&input, |url| self.scheduler.is_warmed(url));

        let current_level = candidates.iter().filter(|c| c.level == level).count();
        let summary = PlanSummary {
            level,
            current_level,
            adjacent_levels: candidates.len() - current_level,
        };

        debug!(
            level,
            epoch,
            current = summary.current_level,
            adjacent = summary.adjacent_levels,
            velocity = %input.velocity,
            "Prefetch pass planned"
        );

        Some(PreparedPass {
            epoch,
            candidates,
            summary,
        })
    }

    /// Queue a prepared pass. Returns `None` if another image was opened
    /// since it was planned.
    fn commit_pass(&self, pass: PreparedPass) -> Option<PlanSummary> {
        let PreparedPass {
            epoch,
            candidates,
            summary,
        } = pass;

        if !self.scheduler.schedule_for(epoch, candidates) {
            return None;
        }

        self.events.publish(EngineEvent::PlanScheduled {
            level: summary.level,
            candidates: summary.total(),
            current_level: summary.current_level,
            adjacent_levels: summary.adjacent_levels,
        });
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::coord::Rect;
    use crate::health::ErrorCategory;
    use crate::prefetch::scheduler::tests::DelayedWarmer;
    use crate::prefetch::viewport::SharedViewport;

    /// 4096×4096 image, 256 px tiles, max level 4 (16×16 at full size).
    struct SquareSource;

    impl TileSource for SquareSource {
        fn tile_url(&self, level: u32, x: u32, y: u32) -> String {
            format!("http://tiles/{}/{}_{}", level, x, y)
        }
        fn level_scale(&self, level: u32) -> f64 {
            2f64.powi(level as i32 - 4)
        }
        fn tile_size(&self, _level: u32) -> u32 {
            256
        }
        fn image_width(&self) -> u64 {
            4096
        }
        fn image_height(&self) -> u64 {
            4096
        }
        fn max_level(&self) -> u32 {
            4
        }
    }

    type TestEngine = PrefetchEngine<SharedViewport, Arc<DelayedWarmer>>;

    fn engine(config: PrefetchConfig) -> (TestEngine, Arc<SharedViewport>, Arc<DelayedWarmer>) {
        let viewport = Arc::new(SharedViewport::new(Rect::new(0.4, 0.4, 0.2, 0.2), 1.0));
        let warmer = Arc::new(DelayedWarmer::succeeding(Duration::from_millis(20)));
        let engine = PrefetchEngine::new(Arc::clone(&viewport), Arc::clone(&warmer), config)
            .expect("engine builds");
        (engine, viewport, warmer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewport_change_plans_after_settle_delay() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));

        engine.on_viewport_change();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(warmer.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(warmer.call_count() > 0);
        engine.wait_idle().await;
        assert!(engine.stats().warmed_count > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_plan_once() {
        let (engine, viewport, _warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        let mut events = engine.subscribe();

        for i in 0..10 {
            viewport.set(Rect::new(0.01 * i as f64, 0.4, 0.2, 0.2), 1.0);
            engine.on_viewport_change();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut plans = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::PlanScheduled { .. }) {
                plans += 1;
            }
        }
        assert_eq!(plans, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_plan_without_image() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        assert_eq!(engine.plan_now(), None);

        engine.on_viewport_change();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(warmer.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_engine_does_nothing() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        engine
            .configure(PartialPrefetchConfig::new().with_enabled(false))
            .unwrap();

        engine.on_viewport_change();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.plan_now(), None);
        assert_eq!(warmer.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_now_summary() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));

        let summary = engine.plan_now().unwrap();
        // Zoom 1.0 selects the top level; only the coarser neighbour exists
        assert_eq!(summary.level, 4);
        assert_eq!(summary.current_level, 256);
        assert_eq!(summary.adjacent_levels, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_respected_through_engine() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        engine
            .configure(PartialPrefetchConfig::new().with_max_concurrent_requests(2))
            .unwrap();

        engine.plan_now();
        assert_eq!(engine.stats().active_count, 2);
        engine.wait_idle().await;
        assert!(warmer.max_in_flight() <= 2);
        assert_eq!(warmer.max_in_flight_per_url(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_configure_keeps_previous() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        let before = engine.config();

        let result = engine.configure(
            PartialPrefetchConfig::new()
                .with_prefetch_radius(1.0)
                .with_max_concurrent_requests(0),
        );
        assert!(matches!(result, Err(PrefetchError::InvalidConfig { .. })));
        assert_eq!(engine.config(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_open_clears_warmed() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        engine.plan_now();
        engine.wait_idle().await;
        assert!(engine.is_warmed("http://tiles/4/8_8"));

        engine.on_image_open(Arc::new(SquareSource));
        assert!(!engine.is_warmed("http://tiles/4/8_8"));
        assert_eq!(engine.stats().warmed_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_decision_once_per_window() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        let mut events = engine.subscribe();

        // A single failure never degrades on its own
        engine.record_tile_outcome(true);
        engine.record_tile_outcome(true);
        engine.record_tile_outcome(false);
        assert!(!engine.is_degraded_default());

        for _ in 0..5 {
            engine.record_tile_outcome(false);
        }
        assert!(engine.is_degraded_default());
        assert_eq!(engine.health().failed_requests, 6);

        let mut decisions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Recovery { error, policy } = event {
                decisions.push((error.category, policy.action));
            }
        }
        assert_eq!(
            decisions,
            vec![(ErrorCategory::TileFailure, RecoveryAction::SilentRetry)]
        );

        // Degrading again in the next window escalates to a visible retry
        engine.reset_health();
        assert_eq!(engine.health(), HealthState::default());
        for _ in 0..DEFAULT_MIN_SAMPLES {
            engine.record_tile_outcome(false);
        }

        let mut escalated = None;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Recovery { policy, .. } = event {
                escalated = Some(policy.action);
            }
        }
        assert_eq!(escalated, Some(RecoveryAction::UserRetry));
    }

    fn recovery_actions(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<RecoveryAction> {
        let mut actions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Recovery { policy, .. } = event {
                actions.push(policy.action);
            }
        }
        actions
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_failure_windows_stay_silent() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        let mut events = engine.subscribe();

        // Each window holds one failed tile, alone or among successes
        for window in [vec![false], vec![false], vec![false, true, true, true], vec![false]] {
            for success in window {
                engine.record_tile_outcome(success);
            }
            engine.reset_health();
        }
        assert!(recovery_actions(&mut events).is_empty());

        // Even a zero threshold needs a second failure
        let viewport = Arc::new(SharedViewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1.0));
        let warmer = DelayedWarmer::succeeding(Duration::from_millis(1));
        let strict = PrefetchEngine::builder(viewport, Arc::new(warmer))
            .degraded_threshold(0.0)
            .min_samples(1)
            .build()
            .unwrap();
        let mut strict_events = strict.subscribe();
        strict.record_tile_outcome(false);
        assert!(strict.is_degraded_default());
        assert!(recovery_actions(&mut strict_events).is_empty());
        strict.record_tile_outcome(false);
        assert_eq!(
            recovery_actions(&mut strict_events),
            vec![RecoveryAction::SilentRetry]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_breach_waits_for_min_samples() {
        let viewport = Arc::new(SharedViewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1.0));
        let warmer = DelayedWarmer::succeeding(Duration::from_millis(1));
        let engine = PrefetchEngine::builder(viewport, Arc::new(warmer))
            .min_samples(6)
            .build()
            .unwrap();
        let mut events = engine.subscribe();

        for _ in 0..5 {
            engine.record_tile_outcome(false);
        }
        assert!(engine.is_degraded_default());
        assert!(recovery_actions(&mut events).is_empty());

        engine.record_tile_outcome(false);
        assert_eq!(recovery_actions(&mut events), vec![RecoveryAction::SilentRetry]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_min_samples_rejected() {
        let viewport = Arc::new(SharedViewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1.0));
        let warmer = DelayedWarmer::succeeding(Duration::from_millis(1));
        let result = PrefetchEngine::builder(viewport, Arc::new(warmer))
            .min_samples(0)
            .build();
        assert!(matches!(
            result,
            Err(PrefetchError::InvalidConfig {
                field: "min_samples",
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_signal_publishes() {
        let (engine, _viewport, _warmer) = engine(PrefetchConfig::default());
        let mut events = engine.subscribe();

        let error = engine.report_signal(&ErrorSignal::HttpStatus {
            endpoint: "http://host/deepzoom/a/info".to_string(),
            status: 401,
            token_expired: true,
        });
        assert_eq!(error.category, ErrorCategory::AuthExpired);

        match events.recv().await.unwrap() {
            EngineEvent::Recovery { error, policy } => {
                assert_eq!(error.category, ErrorCategory::AuthExpired);
                assert_eq!(policy.action, RecoveryAction::Reauthenticate);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // classify alone publishes nothing
        engine.classify(&ErrorSignal::Superseded {
            replaced_by: "b".to_string(),
        });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_is_idempotent_and_final() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        let mut events = engine.subscribe();

        engine.on_viewport_change();
        engine.destroy();
        engine.destroy();
        assert!(engine.is_destroyed());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(warmer.call_count(), 0);
        assert_eq!(engine.plan_now(), None);
        assert_eq!(engine.stats().warmed_count, 0);

        assert_eq!(events.recv().await.unwrap(), EngineEvent::Destroyed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_biases_plan() {
        let config = PrefetchConfig {
            prefetch_radius: 0.0,
            prefetch_adjacent_levels: false,
            ..PrefetchConfig::default()
        };
        let (engine, viewport, _warmer) = engine(config);
        engine.on_image_open(Arc::new(SquareSource));

        viewport.set(Rect::new(0.25, 0.25, 0.25, 0.25), 1.0);
        engine.on_viewport_change();
        tokio::time::sleep(Duration::from_millis(50)).await;
        viewport.set(Rect::new(0.3, 0.25, 0.25, 0.25), 1.0);
        engine.on_viewport_change();

        let summary = engine.plan_now().unwrap();
        // 0.3..0.55 covers columns 4..=8; moving right adds up to 0.675 (column 10)
        assert_eq!(summary.current_level, 7 * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_pass_interleaved_with_image_open() {
        let (engine, _viewport, warmer) = engine(PrefetchConfig::default());
        engine.on_image_open(Arc::new(SquareSource));
        let mut events = engine.subscribe();

        // A pass planned for the first image, committed after the second opened
        let pass = engine.inner.prepare_pass().unwrap();
        assert!(pass.summary.total() > 0);
        engine.on_image_open(Arc::new(SquareSource));
        assert_eq!(engine.inner.commit_pass(pass), None);

        let stats = engine.stats();
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.warmed_count, 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(warmer.call_count(), 0);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, EngineEvent::PlanScheduled { .. }));
        }

        // A fresh pass for the open image goes through
        assert!(engine.plan_now().is_some());
        assert!(engine.stats().active_count > 0);
    }

    #[test]
    fn test_build_requires_runtime() {
        let viewport = Arc::new(SharedViewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), 1.0));
        let warmer = Arc::new(DelayedWarmer::succeeding(Duration::from_millis(1)));
        let result = PrefetchEngine::new(viewport, warmer, PrefetchConfig::default());
        assert!(matches!(result, Err(PrefetchError::NoRuntime)));
    }
}
