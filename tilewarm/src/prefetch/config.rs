//! Prefetch engine options.
//!
//! [`PrefetchConfig`] holds the full option set; [`PartialPrefetchConfig`]
//! carries a subset of overrides that [`PrefetchEngine::configure`] merges
//! into the current values.
//!
//! [`PrefetchEngine::configure`]: super::PrefetchEngine::configure

use std::time::Duration;

use super::error::PrefetchError;

// ==================== Defaults ====================

/// Default viewport expansion, in viewport sizes on each side.
pub const DEFAULT_PREFETCH_RADIUS: f64 = 2.0;

/// Default delay after the last viewport event before planning.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Default cap on concurrent warm requests.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;

/// Default motion extrapolation horizon.
pub const DEFAULT_PREDICTION_LOOKAHEAD_SECONDS: f64 = 0.3;

/// Default extension of the leading edge, in viewport sizes.
pub const DEFAULT_DIRECTION_BIAS: f64 = 0.5;

/// Default number of tiles warmed on each adjacent level.
pub const DEFAULT_ADJACENT_TILE_CAP: usize = 4;

/// Default priority band for adjacent-level candidates.
pub const DEFAULT_ADJACENT_PRIORITY: f64 = 0.5;

/// Prefetch engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// Master switch. When false, planning passes are skipped entirely.
    pub enabled: bool,

    /// How far to expand the viewport on every side, in multiples of its size.
    pub prefetch_radius: f64,

    /// Also warm a few tiles on the next coarser and finer levels.
    pub prefetch_adjacent_levels: bool,

    /// Quiet period after the last viewport event before a planning pass.
    pub settle_delay_ms: u64,

    /// Maximum warm requests in flight at once.
    pub max_concurrent_requests: usize,

    /// How far ahead the motion tracker extrapolates the viewport center.
    pub prediction_lookahead_seconds: f64,

    /// Extension of the leading edge in the direction of travel, in
    /// multiples of the viewport size.
    pub direction_bias: f64,

    /// Tiles kept per adjacent level, nearest the viewport center first.
    pub adjacent_tile_cap: usize,

    /// Priority assigned to adjacent-level candidates.
    ///
    /// This is a ceiling, not a fixed value. When some current-level
    /// candidate ranks at or below it (a viewport near an image corner does
    /// this at default settings), the band drops to half of the lowest
    /// current-level priority so adjacent candidates still rank last.
    pub adjacent_priority: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            prefetch_adjacent_levels: true,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            prediction_lookahead_seconds: DEFAULT_PREDICTION_LOOKAHEAD_SECONDS,
            direction_bias: DEFAULT_DIRECTION_BIAS,
            adjacent_tile_cap: DEFAULT_ADJACENT_TILE_CAP,
            adjacent_priority: DEFAULT_ADJACENT_PRIORITY,
        }
    }
}

impl PrefetchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check every option is in range.
    pub fn validate(&self) -> Result<(), PrefetchError> {
        if !self.prefetch_radius.is_finite() || self.prefetch_radius < 0.0 {
            return Err(PrefetchError::invalid(
                "prefetch_radius",
                format!("must be a non-negative number, got {}", self.prefetch_radius),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(PrefetchError::invalid(
                "max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if !self.prediction_lookahead_seconds.is_finite() || self.prediction_lookahead_seconds < 0.0
        {
            return Err(PrefetchError::invalid(
                "prediction_lookahead_seconds",
                format!(
                    "must be a non-negative number, got {}",
                    self.prediction_lookahead_seconds
                ),
            ));
        }
        if !self.direction_bias.is_finite() || self.direction_bias < 0.0 {
            return Err(PrefetchError::invalid(
                "direction_bias",
                format!("must be a non-negative number, got {}", self.direction_bias),
            ));
        }
        if !(self.adjacent_priority > 0.0 && self.adjacent_priority <= 1.0) {
            return Err(PrefetchError::invalid(
                "adjacent_priority",
                format!("must be in (0, 1], got {}", self.adjacent_priority),
            ));
        }
        Ok(())
    }

    /// Apply `partial` on top of these values. Unset fields are kept.
    pub fn merged(&self, partial: &PartialPrefetchConfig) -> Self {
        Self {
            enabled: partial.enabled.unwrap_or(self.enabled),
            prefetch_radius: partial.prefetch_radius.unwrap_or(self.prefetch_radius),
            prefetch_adjacent_levels: partial
                .prefetch_adjacent_levels
                .unwrap_or(self.prefetch_adjacent_levels),
            settle_delay_ms: partial.settle_delay_ms.unwrap_or(self.settle_delay_ms),
            max_concurrent_requests: partial
                .max_concurrent_requests
                .unwrap_or(self.max_concurrent_requests),
            prediction_lookahead_seconds: partial
                .prediction_lookahead_seconds
                .unwrap_or(self.prediction_lookahead_seconds),
            direction_bias: partial.direction_bias.unwrap_or(self.direction_bias),
            adjacent_tile_cap: partial.adjacent_tile_cap.unwrap_or(self.adjacent_tile_cap),
            adjacent_priority: partial.adjacent_priority.unwrap_or(self.adjacent_priority),
        }
    }
}

/// A set of option overrides. `None` leaves the current value unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialPrefetchConfig {
    pub enabled: Option<bool>,
    pub prefetch_radius: Option<f64>,
    pub prefetch_adjacent_levels: Option<bool>,
    pub settle_delay_ms: Option<u64>,
    pub max_concurrent_requests: Option<usize>,
    pub prediction_lookahead_seconds: Option<f64>,
    pub direction_bias: Option<f64>,
    pub adjacent_tile_cap: Option<usize>,
    pub adjacent_priority: Option<f64>,
}

impl PartialPrefetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_prefetch_radius(mut self, radius: f64) -> Self {
        self.prefetch_radius = Some(radius);
        self
    }

    pub fn with_prefetch_adjacent_levels(mut self, enabled: bool) -> Self {
        self.prefetch_adjacent_levels = Some(enabled);
        self
    }

    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = Some(ms);
        self
    }

    pub fn with_max_concurrent_requests(mut self, count: usize) -> Self {
        self.max_concurrent_requests = Some(count);
        self
    }

    pub fn with_prediction_lookahead_seconds(mut self, seconds: f64) -> Self {
        self.prediction_lookahead_seconds = Some(seconds);
        self
    }

    pub fn with_direction_bias(mut self, bias: f64) -> Self {
        self.direction_bias = Some(bias);
        self
    }

    pub fn with_adjacent_tile_cap(mut self, cap: usize) -> Self {
        self.adjacent_tile_cap = Some(cap);
        self
    }

    pub fn with_adjacent_priority(mut self, priority: f64) -> Self {
        self.adjacent_priority = Some(priority);
        self
    }
}

impl From<PrefetchConfig> for PartialPrefetchConfig {
    fn from(config: PrefetchConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            prefetch_radius: Some(config.prefetch_radius),
            prefetch_adjacent_levels: Some(config.prefetch_adjacent_levels),
            settle_delay_ms: Some(config.settle_delay_ms),
            max_concurrent_requests: Some(config.max_concurrent_requests),
            prediction_lookahead_seconds: Some(config.prediction_lookahead_seconds),
            direction_bias: Some(config.direction_bias),
            adjacent_tile_cap: Some(config.adjacent_tile_cap),
            adjacent_priority: Some(config.adjacent_priority),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PrefetchConfig::default();
        assert!(config.enabled);
        assert_eq!(config.prefetch_radius, 2.0);
        assert!(config.prefetch_adjacent_levels);
        assert_eq!(config.settle_delay_ms, 200);
        assert_eq!(config.max_concurrent_requests, 6);
        assert_eq!(config.prediction_lookahead_seconds, 0.3);
        assert_eq!(config.settle_delay(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let base = PrefetchConfig::default();
        let merged = base.merged(
            &PartialPrefetchConfig::new()
                .with_prefetch_radius(1.0)
                .with_max_concurrent_requests(2),
        );

        assert_eq!(merged.prefetch_radius, 1.0);
        assert_eq!(merged.max_concurrent_requests, 2);
        assert_eq!(merged.settle_delay_ms, base.settle_delay_ms);
        assert_eq!(merged.adjacent_tile_cap, base.adjacent_tile_cap);
    }

    #[test]
    fn test_empty_partial_is_identity() {
        let base = PrefetchConfig {
            enabled: false,
            ..PrefetchConfig::default()
        };
        assert_eq!(base.merged(&PartialPrefetchConfig::default()), base);
    }

    #[test]
    fn test_full_partial_replaces_everything() {
        let target = PrefetchConfig {
            enabled: false,
            prefetch_radius: 0.5,
            prefetch_adjacent_levels: false,
            settle_delay_ms: 50,
            max_concurrent_requests: 1,
            prediction_lookahead_seconds: 1.0,
            direction_bias: 0.0,
            adjacent_tile_cap: 9,
            adjacent_priority: 0.1,
        };
        let merged = PrefetchConfig::default().merged(&target.clone().into());
        assert_eq!(merged, target);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let cases = [
            PartialPrefetchConfig::new().with_prefetch_radius(-1.0),
            PartialPrefetchConfig::new().with_prefetch_radius(f64::NAN),
            PartialPrefetchConfig::new().with_max_concurrent_requests(0),
            PartialPrefetchConfig::new().with_prediction_lookahead_seconds(-0.1),
            PartialPrefetchConfig::new().with_direction_bias(f64::INFINITY),
            PartialPrefetchConfig::new().with_adjacent_priority(0.0),
            PartialPrefetchConfig::new().with_adjacent_priority(1.5),
        ];

        for partial in cases {
            let config = PrefetchConfig::default().merged(&partial);
            assert!(
                matches!(config.validate(), Err(PrefetchError::InvalidConfig { .. })),
                "{:?} should be rejected",
                partial
            );
        }
    }

    #[test]
    fn test_zero_radius_is_valid() {
        let config = PrefetchConfig::default()
            .merged(&PartialPrefetchConfig::new().with_prefetch_radius(0.0));
        assert!(config.validate().is_ok());
    }
}
