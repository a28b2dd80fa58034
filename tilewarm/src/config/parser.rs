//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::prefetch::PrefetchError;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [prefetch] section
    if let Some(section) = ini.section(Some("prefetch")) {
        let prefetch = &mut config.prefetch;
        if let Some(v) = section.get("enabled") {
            prefetch.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("radius") {
            prefetch.prefetch_radius = parse_number(
                "prefetch",
                "radius",
                v,
                "must be a non-negative number (viewport sizes)",
            )?;
        }
        if let Some(v) = section.get("adjacent_levels") {
            prefetch.prefetch_adjacent_levels = parse_bool(v);
        }
        if let Some(v) = section.get("settle_delay_ms") {
            prefetch.settle_delay_ms = parse_number(
                "prefetch",
                "settle_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("max_concurrent_requests") {
            prefetch.max_concurrent_requests = parse_number(
                "prefetch",
                "max_concurrent_requests",
                v,
                "must be a positive integer",
            )?;
        }
        if let Some(v) = section.get("lookahead_seconds") {
            prefetch.prediction_lookahead_seconds = parse_number(
                "prefetch",
                "lookahead_seconds",
                v,
                "must be a non-negative number (seconds)",
            )?;
        }
        if let Some(v) = section.get("direction_bias") {
            prefetch.direction_bias = parse_number(
                "prefetch",
                "direction_bias",
                v,
                "must be a non-negative number (viewport sizes)",
            )?;
        }
        if let Some(v) = section.get("adjacent_tile_cap") {
            prefetch.adjacent_tile_cap = parse_number(
                "prefetch",
                "adjacent_tile_cap",
                v,
                "must be a non-negative integer",
            )?;
        }
        if let Some(v) = section.get("adjacent_priority") {
            prefetch.adjacent_priority = parse_number(
                "prefetch",
                "adjacent_priority",
                v,
                "must be a number in (0, 1]",
            )?;
        }

        config
            .prefetch
            .validate()
            .map_err(|e| prefetch_range_error(section, e))?;
    }

    // [health] section
    if let Some(section) = ini.section(Some("health")) {
        if let Some(v) = section.get("degraded_threshold") {
            let threshold: f64 = parse_number(
                "health",
                "degraded_threshold",
                v,
                "must be a number between 0 and 1",
            )?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(invalid(
                    "health",
                    "degraded_threshold",
                    v,
                    "must be a number between 0 and 1",
                ));
            }
            config.health.degraded_threshold = threshold;
        }
        if let Some(v) = section.get("min_samples") {
            let min_samples: u64 =
                parse_number("health", "min_samples", v, "must be a positive integer")?;
            if min_samples == 0 {
                return Err(invalid(
                    "health",
                    "min_samples",
                    v,
                    "must be a positive integer",
                ));
            }
            config.health.min_samples = min_samples;
        }
    }

    // [http] section
    if let Some(section) = ini.section(Some("http")) {
        if let Some(v) = section.get("timeout_secs") {
            let timeout: u64 = parse_number(
                "http",
                "timeout_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
            if timeout == 0 {
                return Err(invalid(
                    "http",
                    "timeout_secs",
                    v,
                    "must be a positive integer (seconds)",
                ));
            }
            config.http.timeout_secs = timeout;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.http.user_agent = v.to_string();
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

/// INI key for each prefetch option, as reported by validation.
fn prefetch_key(field: &str) -> &str {
    match field {
        "prefetch_radius" => "radius",
        "prefetch_adjacent_levels" => "adjacent_levels",
        "prediction_lookahead_seconds" => "lookahead_seconds",
        other => other,
    }
}

fn prefetch_range_error(section: &Properties, error: PrefetchError) -> ConfigFileError {
    match error {
        PrefetchError::InvalidConfig { field, reason } => {
            let key = prefetch_key(field);
            invalid(
                "prefetch",
                key,
                section.get(key).unwrap_or_default(),
                &reason,
            )
        }
        other => invalid("prefetch", "", "", &other.to_string()),
    }
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
