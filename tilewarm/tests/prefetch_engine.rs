//! Integration tests for the prefetch engine.
//!
//! These drive the public engine API the way a viewer shell would:
//! - image open → viewport events → settle → planned warm requests
//! - rendered-tile outcomes → health → recovery decisions
//! - destroy with requests still in flight
//!
//! Time is paused, so settle delays and request latency are simulated.
//!
//! Run with: `cargo test --test prefetch_engine`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use tilewarm::coord::Rect;
use tilewarm::health::{ErrorCategory, ErrorSignal, RecoveryAction};
use tilewarm::prefetch::{
    EngineEvent, PartialPrefetchConfig, PrefetchConfig, PrefetchEngine, SharedViewport,
};
use tilewarm::source::{DeepZoomSource, DziInfo, TileSource, TileWarmer, WarmError};

// ============================================================================
// Test Helpers
// ============================================================================

/// Warmer that simulates latency and counts concurrency.
#[derive(Default)]
struct RecordingWarmer {
    latency_ms: u64,
    failing_suffix: Option<&'static str>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
    peak_per_url: AtomicUsize,
}

impl RecordingWarmer {
    fn with_latency(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl TileWarmer for RecordingWarmer {
    async fn warm(&self, url: &str) -> Result<(), WarmError> {
        self.requests.lock().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_url = self.per_url.lock();
            let count = per_url.entry(url.to_string()).or_insert(0);
            *count += 1;
            self.peak_per_url.fetch_max(*count, Ordering::SeqCst);
        }

        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.per_url.lock().get_mut(url) {
            *count -= 1;
        }

        match self.failing_suffix {
            Some(suffix) if url.ends_with(suffix) => Err(WarmError::Status(500)),
            _ => Ok(()),
        }
    }
}

/// 8192×8192 slide with 256 px tiles; DeepZoom max level 13.
///
/// Level 13 is 32×32 tiles, level 12 is 16×16, level 11 is 8×8.
fn slide() -> Arc<DeepZoomSource> {
    let info = DziInfo::from_json(
        r#"{"format":"jpeg","overlap":0,"tileSize":256,"width":8192,"height":8192,"levels":6,"maxLevel":13}"#,
    )
    .expect("valid descriptor");
    Arc::new(DeepZoomSource::new("http://slides.test/", "case-17", info))
}

fn setup(
    warmer: RecordingWarmer,
) -> (
    PrefetchEngine<SharedViewport, Arc<RecordingWarmer>>,
    Arc<SharedViewport>,
    Arc<RecordingWarmer>,
) {
    // Zoom 0.5 on this slide selects level 12 (16×16 grid)
    let viewport = Arc::new(SharedViewport::new(Rect::new(0.4, 0.4, 0.2, 0.2), 0.5));
    let warmer = Arc::new(warmer);
    let engine = PrefetchEngine::new(
        Arc::clone(&viewport),
        Arc::clone(&warmer),
        PrefetchConfig::default(),
    )
    .expect("engine builds inside a runtime");
    (engine, viewport, warmer)
}

fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Prefetch flow
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_settled_viewport_warms_ranked_tiles() {
    let (engine, _viewport, warmer) = setup(RecordingWarmer::with_latency(30));
    engine.on_image_open(slide());

    engine.on_animation_settle();
    tokio::time::sleep(Duration::from_millis(250)).await;
    engine.wait_idle().await;

    let requests = warmer.requests();
    // 16×16 current level + 4 coarser + 4 finer
    assert_eq!(requests.len(), 256 + 4 + 4);
    assert_eq!(engine.stats().warmed_count, requests.len());

    // Highest priority first: the tiles around the viewport center
    let first_four: Vec<&str> = requests[..4].iter().map(String::as_str).collect();
    assert_eq!(
        first_four,
        vec![
            "http://slides.test/deepzoom/case-17_files/12/7_7.jpeg",
            "http://slides.test/deepzoom/case-17_files/12/8_7.jpeg",
            "http://slides.test/deepzoom/case-17_files/12/7_8.jpeg",
            "http://slides.test/deepzoom/case-17_files/12/8_8.jpeg",
        ]
    );

    // Adjacent levels come last, coarser before finer
    let tail: Vec<&String> = requests[256..].iter().collect();
    assert!(tail[..4].iter().all(|u| u.contains("_files/11/")));
    assert!(tail[4..].iter().all(|u| u.contains("_files/13/")));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_and_dedup_under_panning() {
    let (engine, viewport, warmer) = setup(RecordingWarmer::with_latency(40));
    engine.on_image_open(slide());
    engine
        .configure(PartialPrefetchConfig::new().with_max_concurrent_requests(3))
        .unwrap();

    // Pan right in small steps; each pass overlaps the previous one
    for step in 0..8 {
        let x = 0.3 + 0.02 * step as f64;
        viewport.set(Rect::new(x, 0.4, 0.2, 0.2), 0.5);
        engine.on_viewport_change();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    engine.wait_idle().await;

    assert!(warmer.peak_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(warmer.peak_per_url.load(Ordering::SeqCst), 1);

    let requests = warmer.requests();
    let mut unique = requests.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), requests.len());
}

#[tokio::test(start_paused = true)]
async fn test_failed_tiles_are_retried_on_next_pass() {
    let warmer = RecordingWarmer {
        latency_ms: 10,
        failing_suffix: Some("/12/8_8.jpeg"),
        ..Default::default()
    };
    let (engine, _viewport, warmer) = setup(warmer);
    engine.on_image_open(slide());
    let failing = slide().tile_url(12, 8, 8);

    engine.plan_now();
    engine.wait_idle().await;
    assert!(!engine.is_warmed(&failing));
    assert_eq!(engine.stats().requests_failed, 1);

    engine.plan_now();
    engine.wait_idle().await;

    let attempts = warmer.requests().iter().filter(|u| **u == failing).count();
    assert_eq!(attempts, 2);
    // Prefetch failures never count against rendered-tile health
    assert_eq!(engine.health().total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_image_starts_fresh() {
    let (engine, _viewport, warmer) = setup(RecordingWarmer::with_latency(10));
    engine.on_image_open(slide());
    engine.plan_now();
    engine.wait_idle().await;
    let first_pass = warmer.requests().len();

    engine.on_image_open(slide());
    assert_eq!(engine.stats().warmed_count, 0);

    engine.plan_now();
    engine.wait_idle().await;
    assert_eq!(warmer.requests().len(), first_pass * 2);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_with_requests_in_flight() {
    let (engine, _viewport, warmer) = setup(RecordingWarmer::with_latency(500));
    engine.on_image_open(slide());
    let mut events = engine.subscribe();

    engine.plan_now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.stats().active_count, 6);

    engine.destroy();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stats = engine.stats();
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.warmed_count, 0);
    assert_eq!(stats.pending_count, 0);
    // Nothing was dequeued after destroy
    assert_eq!(warmer.requests().len(), 6);

    let after: Vec<EngineEvent> = drain(&mut events)
        .into_iter()
        .skip_while(|e| !matches!(e, EngineEvent::Destroyed))
        .collect();
    assert_eq!(after, vec![EngineEvent::Destroyed]);
}

// ============================================================================
// Health and recovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rendered_tile_failures_trigger_tile_failure_decision() {
    let (engine, _viewport, _warmer) = setup(RecordingWarmer::with_latency(10));
    let mut events = engine.subscribe();

    for success in [true, false, false, true, false] {
        engine.record_tile_outcome(success);
    }

    let health = engine.health();
    assert_eq!((health.total_requests, health.failed_requests), (5, 3));
    assert!(engine.is_degraded(0.5));
    assert!(!engine.is_degraded(0.6));

    let decisions: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Recovery { error, policy } => Some((error.category, policy.action)),
            _ => None,
        })
        .collect();
    assert_eq!(
        decisions,
        vec![(ErrorCategory::TileFailure, RecoveryAction::SilentRetry)]
    );

    engine.reset_health();
    assert!(!engine.is_degraded_default());
}

#[tokio::test(start_paused = true)]
async fn test_control_plane_signals_bypass_health() {
    let (engine, _viewport, _warmer) = setup(RecordingWarmer::with_latency(10));

    let auth = engine.report_signal(&ErrorSignal::HttpStatus {
        endpoint: "http://slides.test/deepzoom/case-17/info".to_string(),
        status: 401,
        token_expired: true,
    });
    assert_eq!(auth.category, ErrorCategory::AuthExpired);
    assert!(!auth.retryable);

    let metadata = serde_json::json!({"id": "case-17", "replacedBy": "case-18"});
    let signal = tilewarm::health::supersession_signal(&metadata).expect("superseded");
    let superseded = engine.report_signal(&signal);
    assert_eq!(superseded.category, ErrorCategory::Superseded);
    assert!(superseded.policy().dismissible);

    assert_eq!(engine.health().total_requests, 0);
}
