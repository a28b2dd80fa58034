//! Default values for all configuration settings, and the
//! `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::prefetch::PrefetchConfig;
use crate::source::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

pub use crate::health::{DEFAULT_DEGRADED_THRESHOLD, DEFAULT_MIN_SAMPLES};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT.as_secs();

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "tilewarm.log";

/// Default log directory (~/.tilewarm/logs).
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            prefetch: PrefetchConfig::default(),
            health: HealthSettings {
                degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
                min_samples: DEFAULT_MIN_SAMPLES,
            },
            http: HttpSettings {
                timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            logging: LoggingSettings {
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
