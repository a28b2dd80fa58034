//! Prefetch candidate planning.
//!
//! A planning pass turns the current viewport into a ranked list of tiles to
//! warm:
//!
//! ```text
//!   ┌───────────────────────────────────┐
//!   │ expanded by prefetch_radius       │
//!   │        ┌───────────┐              │ ──► leading edge pushed out by
//!   │        │ viewport  │   ● predicted│     direction_bias when moving
//!   │        └───────────┘     center   │
//!   └───────────────────────────────────┘
//! ```
//!
//! Current-level tiles inside the expanded region are ranked by distance
//! from the predicted center. The next coarser and finer levels contribute a
//! handful of tiles under the plain viewport, in a fixed lower priority band.

use std::cmp::Ordering;

use tracing::trace;

use crate::coord::{self, Point, Rect, TileCoord};
use crate::source::TileSource;

use super::config::PrefetchConfig;

/// One tile the planner wants warmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchCandidate {
    pub level: u32,
    pub tile_x: u32,
    pub tile_y: u32,
    pub url: String,
    /// In `(0, 1]`; higher is fetched first.
    pub priority: f64,
}

impl PrefetchCandidate {
    pub fn tile(&self) -> TileCoord {
        TileCoord::new(self.level, self.tile_x, self.tile_y)
    }
}

/// Viewport inputs to a planning pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanInput {
    /// Visible region in normalized image space.
    pub bounds: Rect,
    /// Pyramid level currently rendered.
    pub level: u32,
    /// Center velocity, used only for its direction.
    pub velocity: Point,
    /// Extrapolated viewport center.
    pub predicted_center: Point,
}

impl PlanInput {
    /// Input for a viewport that is not moving.
    pub fn at_rest(bounds: Rect, level: u32) -> Self {
        Self {
            bounds,
            level,
            velocity: Point::ZERO,
            predicted_center: bounds.center(),
        }
    }
}

/// Computes ranked prefetch candidates for one tile source.
pub struct PrefetchPlanner<'a, S: TileSource + ?Sized> {
    source: &'a S,
    config: &'a PrefetchConfig,
}

impl<'a, S: TileSource + ?Sized> PrefetchPlanner<'a, S> {
    pub fn new(source: &'a S, config: &'a PrefetchConfig) -> Self {
        Self { source, config }
    }

    /// Plan candidates for `input`, skipping URLs for which `is_warmed`
    /// returns true.
    ///
    /// The result is sorted by priority, highest first. Ties go to the
    /// current level, then to the lower level, then by row and column.
    pub fn plan(
        &self,
        input: &PlanInput,
        is_warmed: impl Fn(&str) -> bool,
    ) -> Vec<PrefetchCandidate> {
        let level = input.level.min(self.source.max_level());

        let mut candidates = self.current_level(input, level);

        if self.config.prefetch_adjacent_levels && self.config.adjacent_tile_cap > 0 {
            let band = self.adjacent_band(&candidates);
            let finer = level
                .checked_add(1)
                .filter(|l| *l <= self.source.max_level());

            for adjacent in [level.checked_sub(1), finer].into_iter().flatten() {
                candidates.extend(self.adjacent_level(&input.bounds, adjacent, band));
            }
        }

        let planned = candidates.len();
        candidates.retain(|c| !is_warmed(&c.url));
        candidates.sort_by(|a, b| rank(a, b, level));

        trace!(
            level,
            planned,
            kept = candidates.len(),
            "Planned prefetch candidates"
        );

        candidates
    }

    fn current_level(&self, input: &PlanInput, level: u32) -> Vec<PrefetchCandidate> {
        let region = input
            .bounds
            .expand(self.config.prefetch_radius)
            .extend_towards(input.velocity, self.config.direction_bias, &input.bounds);

        let grid = coord::grid_size(self.source, level);

        coord::tiles_in_rect(&region, level, grid)
            .into_iter()
            .map(|tile| {
                let distance = coord::tile_center(&tile, grid).distance(&input.predicted_center);
                self.candidate(tile, 1.0 / (1.0 + distance))
            })
            .collect()
    }

    fn adjacent_level(&self, bounds: &Rect, level: u32, priority: f64) -> Vec<PrefetchCandidate> {
        let grid = coord::grid_size(self.source, level);
        let center = bounds.center();

        let mut tiles: Vec<(TileCoord, f64)> = coord::tiles_in_rect(bounds, level, grid)
            .into_iter()
            .map(|tile| (tile, coord::tile_center(&tile, grid).distance(&center)))
            .collect();

        tiles.sort_by(|(ta, da), (tb, db)| {
            da.total_cmp(db)
                .then(ta.y.cmp(&tb.y))
                .then(ta.x.cmp(&tb.x))
        });
        tiles.truncate(self.config.adjacent_tile_cap);

        tiles
            .into_iter()
            .map(|(tile, _)| self.candidate(tile, priority))
            .collect()
    }

    /// Priority for adjacent-level candidates.
    ///
    /// Normally the configured band. If a current-level candidate would rank
    /// at or below it, the band drops to half the lowest current-level
    /// priority so adjacent levels always come last.
    fn adjacent_band(&self, current: &[PrefetchCandidate]) -> f64 {
        let lowest = current
            .iter()
            .map(|c| c.priority)
            .fold(f64::INFINITY, f64::min);

        if lowest <= self.config.adjacent_priority {
            lowest / 2.0
        } else {
            self.config.adjacent_priority
        }
    }

    fn candidate(&self, tile: TileCoord, priority: f64) -> PrefetchCandidate {
        PrefetchCandidate {
            level: tile.level,
            tile_x: tile.x,
            tile_y: tile.y,
            url: self.source.tile_url(tile.level, tile.x, tile.y),
            priority,
        }
    }
}

fn rank(a: &PrefetchCandidate, b: &PrefetchCandidate, current_level: u32) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| (a.level != current_level).cmp(&(b.level != current_level)))
        .then(a.level.cmp(&b.level))
        .then(a.tile_y.cmp(&b.tile_y))
        .then(a.tile_x.cmp(&b.tile_x))
}

/// Pyramid level to treat as current for a viewport `zoom`.
///
/// `zoom` is rendered screen pixels per full-resolution image pixel. Picks
/// the lowest level whose scale is at least `zoom`, or the top level when
/// none is.
pub fn level_for_zoom<S: TileSource + ?Sized>(source: &S, zoom: f64) -> u32 {
    let max_level = source.max_level();
    if zoom.is_nan() {
        return max_level;
    }

    (0..=max_level)
        .find(|&level| source.level_scale(level) >= zoom)
        .unwrap_or(max_level)
}
