//! Plan command - show the ranked prefetch candidates for a viewport.
//!
//! Works offline from a saved DeepZoom descriptor; nothing is requested.

use std::path::PathBuf;

use tracing::info;

use tilewarm::coord::Point;
use tilewarm::prefetch::{level_for_zoom, PlanInput, PrefetchCandidate, PrefetchPlanner};
use tilewarm::source::{DeepZoomSource, DziInfo};

use super::common::{velocity, PrefetchOverrides, ViewportArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the plan command.
pub struct PlanArgs {
    pub config_path: Option<PathBuf>,
    pub info: PathBuf,
    pub base_url: String,
    pub image_id: String,
    pub viewport: ViewportArgs,
    pub vx: f64,
    pub vy: f64,
    pub overrides: PrefetchOverrides,
    pub limit: Option<usize>,
    pub json: bool,
}

/// Run the plan command.
pub fn run(args: PlanArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config_path.as_deref())?;
    runner.log_startup("plan");

    let config = args.overrides.apply(&runner.config().prefetch)?;
    let bounds = args.viewport.bounds()?;
    let zoom = args.viewport.zoom()?;
    let velocity = velocity(args.vx, args.vy)?;

    let text = std::fs::read_to_string(&args.info).map_err(|e| CliError::FileRead {
        path: args.info.display().to_string(),
        error: e,
    })?;
    let info = DziInfo::from_json(&text).map_err(|e| {
        CliError::InvalidInput(format!(
            "'{}' is not a DeepZoom descriptor: {}",
            args.info.display(),
            e
        ))
    })?;
    let source = DeepZoomSource::new(args.base_url, args.image_id, info);

    let level = level_for_zoom(&source, zoom);
    let center = bounds.center();
    let lookahead = config.prediction_lookahead_seconds;
    let input = PlanInput {
        bounds,
        level,
        velocity,
        predicted_center: Point::new(
            center.x + velocity.x * lookahead,
            center.y + velocity.y * lookahead,
        ),
    };

    let mut candidates = PrefetchPlanner::new(&source, &config).plan(&input, |_| false);
    info!(level, candidates = candidates.len(), "Prefetch plan computed");

    let total = candidates.len();
    if let Some(limit) = args.limit {
        candidates.truncate(limit);
    }

    if args.json {
        for candidate in &candidates {
            println!("{}", candidate_json(candidate));
        }
        return Ok(());
    }

    println!("Prefetch plan for {}", source.image_id());
    println!("  Level:      {} (zoom {})", level, zoom);
    println!("  Candidates: {}", total);
    println!();
    println!("{:>5}  {:>6}  {:>5}  {:>5}  URL", "LEVEL", "PRIO", "X", "Y");
    for candidate in &candidates {
        println!(
            "{:>5}  {:>6.3}  {:>5}  {:>5}  {}",
            candidate.level, candidate.priority, candidate.tile_x, candidate.tile_y, candidate.url
        );
    }
    if candidates.len() < total {
        println!("  ... {} more", total - candidates.len());
    }

    Ok(())
}

fn candidate_json(candidate: &PrefetchCandidate) -> serde_json::Value {
    serde_json::json!({
        "level": candidate.level,
        "x": candidate.tile_x,
        "y": candidate.tile_y,
        "priority": candidate.priority,
        "url": candidate.url,
    })
}
