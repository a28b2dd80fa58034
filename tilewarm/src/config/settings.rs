//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;
use std::time::Duration;

use crate::prefetch::PrefetchConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Prefetch engine options (`[prefetch]`)
    pub prefetch: PrefetchConfig,
    /// Rendered-tile health settings
    pub health: HealthSettings,
    /// HTTP client settings for descriptor and warm requests
    pub http: HttpSettings,
    /// Log output settings
    pub logging: LoggingSettings,
}

/// Rendered-tile health configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSettings {
    /// Failure rate above which delivery is reported degraded.
    pub degraded_threshold: f64,
    /// Rendered tiles a window must contain before degradation is reported.
    pub min_samples: u64,
}

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Directory the log file is written to.
    pub directory: PathBuf,
    /// Log file name.
    pub file: String,
}
