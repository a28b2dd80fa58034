//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let p = &config.prefetch;

    format!(
        r#"[prefetch]
; Warm the tile cache ahead of the viewport (default: true)
enabled = {}
; Expand the viewport by this many viewport sizes on every side (default: 2.0)
radius = {}
; Also warm a few tiles on the next coarser and finer levels (default: true)
adjacent_levels = {}
; Quiet period after the last viewport change before planning, in ms (default: 200)
settle_delay_ms = {}
; Maximum warm requests in flight at once (default: 6)
max_concurrent_requests = {}
; How far ahead viewport motion is extrapolated, in seconds (default: 0.3)
lookahead_seconds = {}
; Extra reach in the direction of travel, in viewport sizes (default: 0.5)
direction_bias = {}
; Tiles warmed per adjacent level, nearest the viewport center (default: 4)
adjacent_tile_cap = {}
; Priority of adjacent-level tiles (default: 0.5)
; Lowered to half the lowest current-level priority when a current-level tile
; ranks at or below this value, so adjacent tiles always come last.
adjacent_priority = {}

[health]
; Rendered-tile failure rate above which delivery is degraded (default: 0.5)
; The comparison is strict: exactly 0.5 is not degraded.
degraded_threshold = {}
; Rendered tiles a window must contain, with at least two failed, before
; degradation is reported (default: 4)
min_samples = {}

[http]
; Timeout in seconds for descriptor and warm requests (default: 30)
timeout_secs = {}
; User-Agent header sent with every request
user_agent = {}

[logging]
; Directory for the log file (default: ~/.tilewarm/logs)
directory = {}
; Log file name, cleared at the start of each session (default: tilewarm.log)
file = {}
"#,
        p.enabled,
        p.prefetch_radius,
        p.prefetch_adjacent_levels,
        p.settle_delay_ms,
        p.max_concurrent_requests,
        p.prediction_lookahead_seconds,
        p.direction_bias,
        p.adjacent_tile_cap,
        p.adjacent_priority,
        config.health.degraded_threshold,
        config.health.min_samples,
        config.http.timeout_secs,
        config.http.user_agent,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
