//! Common arguments and helpers shared across CLI commands.

use clap::Args;

use tilewarm::coord::{Point, Rect};
use tilewarm::prefetch::{PartialPrefetchConfig, PrefetchConfig};

use crate::error::CliError;

/// Visible region of the image, in normalized image coordinates.
#[derive(Debug, Clone, Args)]
pub struct ViewportArgs {
    /// Left edge of the viewport (0.0 - 1.0 of image width)
    #[arg(long, default_value = "0.0")]
    pub x: f64,

    /// Top edge of the viewport (0.0 - 1.0 of image height)
    #[arg(long, default_value = "0.0")]
    pub y: f64,

    /// Viewport width as a fraction of image width
    #[arg(long, default_value = "1.0")]
    pub width: f64,

    /// Viewport height as a fraction of image height
    #[arg(long, default_value = "1.0")]
    pub height: f64,

    /// Screen pixels per full-resolution image pixel
    #[arg(long, default_value = "1.0")]
    pub zoom: f64,
}

impl ViewportArgs {
    /// Validated viewport bounds.
    pub fn bounds(&self) -> Result<Rect, CliError> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CliError::InvalidInput(
                "viewport coordinates must be finite numbers".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(CliError::InvalidInput(
                "viewport width and height must be positive".to_string(),
            ));
        }
        Ok(Rect::new(self.x, self.y, self.width, self.height))
    }

    /// Validated zoom factor.
    pub fn zoom(&self) -> Result<f64, CliError> {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(CliError::InvalidInput(format!(
                "zoom must be a positive number, got {}",
                self.zoom
            )));
        }
        Ok(self.zoom)
    }
}

/// Prefetch option overrides on top of config.ini.
#[derive(Debug, Clone, Default, Args)]
pub struct PrefetchOverrides {
    /// Viewport multiples to prefetch around the visible region
    #[arg(long)]
    pub radius: Option<f64>,

    /// Maximum warm requests in flight
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Do not prefetch the neighboring resolution levels
    #[arg(long)]
    pub no_adjacent: bool,
}

impl PrefetchOverrides {
    /// Apply the overrides to `base` and validate the result.
    pub fn apply(&self, base: &PrefetchConfig) -> Result<PrefetchConfig, CliError> {
        let mut partial = PartialPrefetchConfig::new();
        if let Some(radius) = self.radius {
            partial = partial.with_prefetch_radius(radius);
        }
        if let Some(max) = self.max_concurrent {
            partial = partial.with_max_concurrent_requests(max);
        }
        if self.no_adjacent {
            partial = partial.with_prefetch_adjacent_levels(false);
        }

        let config = base.merged(&partial);
        config.validate()?;
        Ok(config)
    }
}

/// Viewport velocity in normalized units per second.
pub fn velocity(vx: f64, vy: f64) -> Result<Point, CliError> {
    if !vx.is_finite() || !vy.is_finite() {
        return Err(CliError::InvalidInput(
            "velocity must be finite".to_string(),
        ));
    }
    Ok(Point::new(vx, vy))
}
