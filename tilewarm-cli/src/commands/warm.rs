//! Warm command - prefetch the tiles around a viewport against a live server.
//!
//! Fetches the image descriptor, runs one planning pass through the
//! prefetch engine, and waits for the warm requests to drain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use tilewarm::config::ConfigFile;
use tilewarm::coord::Rect;
use tilewarm::prefetch::{
    EngineEvent, PrefetchConfig, PrefetchEngine, PrefetchStats, SharedViewport,
};
use tilewarm::source::{DeepZoomSource, ReqwestWarmer};

use super::common::{PrefetchOverrides, ViewportArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the warm command.
pub struct WarmArgs {
    pub config_path: Option<PathBuf>,
    pub base_url: String,
    pub image_id: String,
    pub viewport: ViewportArgs,
    pub overrides: PrefetchOverrides,
    pub timeout: Option<u64>,
}

/// Run the warm command.
pub fn run(args: WarmArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config_path.as_deref())?;
    runner.log_startup("warm");
    let config = runner.config();

    let prefetch = args.overrides.apply(&config.prefetch)?;
    let bounds = args.viewport.bounds()?;
    let zoom = args.viewport.zoom()?;

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(warm(&args, config, prefetch, bounds, zoom))
}

async fn warm(
    args: &WarmArgs,
    config: &ConfigFile,
    prefetch: PrefetchConfig,
    bounds: Rect,
    zoom: f64,
) -> Result<(), CliError> {
    let warmer = ReqwestWarmer::with_settings(config.http.timeout(), &config.http.user_agent)?;

    println!("Fetching descriptor for {}...", args.image_id);
    let source = DeepZoomSource::fetch(warmer.client(), &args.base_url, &args.image_id).await?;
    let info = source.info();
    println!(
        "  {}x{} px, {} px tiles, max level {}",
        info.width, info.height, info.tile_size, info.max_level
    );

    let viewport = Arc::new(SharedViewport::new(bounds, zoom));
    let engine = PrefetchEngine::builder(viewport, warmer)
        .config(prefetch)
        .degraded_threshold(config.health.degraded_threshold)
        .min_samples(config.health.min_samples)
        .build()?;

    let progress = tokio::spawn(log_progress(engine.subscribe()));

    engine.on_image_open(Arc::new(source));
    let Some(summary) = engine.plan_now() else {
        println!("Prefetch is disabled; nothing to warm.");
        engine.destroy();
        return Ok(());
    };
    println!(
        "Warming {} tiles (level {}: {}, adjacent levels: {})...",
        summary.total(),
        summary.level,
        summary.current_level,
        summary.adjacent_levels
    );

    let start = Instant::now();
    let finished = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), engine.wait_idle())
            .await
            .is_ok(),
        None => {
            engine.wait_idle().await;
            true
        }
    };

    let stats = engine.stats();
    engine.destroy();
    let _ = progress.await;

    print_stats(&stats, start.elapsed());
    if !finished {
        warn!(pending = stats.pending_count, "Warm timed out");
        println!("Timed out with {} tiles still queued.", stats.pending_count);
    }

    Ok(())
}

/// Log warm outcomes until the engine is destroyed.
async fn log_progress(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::TileWarmed { url }) => debug!(url = %url, "Tile warmed"),
            Ok(EngineEvent::WarmFailed { url, error }) => {
                debug!(url = %url, error = %error, "Warm request failed")
            }
            Ok(EngineEvent::Destroyed) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Progress log lagged behind engine events")
            }
        }
    }
}

fn print_stats(stats: &PrefetchStats, elapsed: Duration) {
    info!(
        warmed = stats.warmed_count,
        failed = stats.requests_failed,
        issued = stats.requests_issued,
        elapsed_ms = elapsed.as_millis() as u64,
        "Warm finished"
    );

    println!();
    println!("Warm complete in {:.2}s", elapsed.as_secs_f64());
    println!("  Requests issued: {}", stats.requests_issued);
    println!("  Tiles warmed:    {}", stats.warmed_count);
    println!("  Failed:          {}", stats.requests_failed);
}
