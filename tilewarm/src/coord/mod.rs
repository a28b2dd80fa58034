//! Tile grid geometry.
//!
//! Converts between normalized image-space rectangles and tile indices on a
//! given pyramid level of a [`TileSource`](crate::source::TileSource).

mod types;

pub use types::{GridSize, Point, Rect, TileCoord};

use std::ops::RangeInclusive;

use crate::source::TileSource;

/// Number of tile columns and rows at `level`.
///
/// `ceil(image_size * level_scale / tile_size)` on each axis. Degenerate
/// inputs (zero tile size, non-positive scale) yield an empty grid.
pub fn grid_size<S: TileSource + ?Sized>(source: &S, level: u32) -> GridSize {
    let scale = source.level_scale(level);
    let tile_size = source.tile_size(level) as f64;

    if tile_size <= 0.0 || !(scale > 0.0) {
        return GridSize {
            columns: 0,
            rows: 0,
        };
    }

    let columns = (source.image_width() as f64 * scale / tile_size).ceil();
    let rows = (source.image_height() as f64 * scale / tile_size).ceil();

    GridSize {
        columns: columns.max(0.0) as u32,
        rows: rows.max(0.0) as u32,
    }
}

/// Index range of tiles along one axis that intersect `[min, max]`.
///
/// The range is `floor(min * count) ..= ceil(max * count) - 1`, clamped to
/// `[0, count - 1]`. Returns `None` when the span lies entirely outside the
/// grid or the grid is empty.
pub fn axis_range(min: f64, max: f64, count: u32) -> Option<RangeInclusive<u32>> {
    if count == 0 || max <= 0.0 || min >= 1.0 || max <= min {
        return None;
    }

    let last = (count - 1) as f64;
    let start = (min * count as f64).floor().clamp(0.0, last) as u32;
    let end = ((max * count as f64).ceil() - 1.0).clamp(0.0, last) as u32;

    if start > end {
        return None;
    }
    Some(start..=end)
}

/// All tiles on `level` that intersect `bounds`, in row-major order.
pub fn tiles_in_rect(bounds: &Rect, level: u32, grid: GridSize) -> Vec<TileCoord> {
    let (Some(cols), Some(rows)) = (
        axis_range(bounds.left, bounds.right, grid.columns),
        axis_range(bounds.top, bounds.bottom, grid.rows),
    ) else {
        return Vec::new();
    };

    rows.flat_map(|y| cols.clone().map(move |x| TileCoord::new(level, x, y)))
        .collect()
}

/// Center of a tile in normalized image space.
#[inline]
pub fn tile_center(tile: &TileCoord, grid: GridSize) -> Point {
    Point::new(
        (tile.x as f64 + 0.5) / grid.columns.max(1) as f64,
        (tile.y as f64 + 0.5) / grid.rows.max(1) as f64,
    )
}
