//! User configuration.
//!
//! Settings are read from `~/.tilewarm/config.ini` and overlaid on defaults:
//!
//! ```ini
//! [prefetch]
//! radius = 2.0
//! max_concurrent_requests = 6
//!
//! [health]
//! degraded_threshold = 0.5
//! min_samples = 4
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tilewarm::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! println!("{} warm requests in flight", config.prefetch.max_concurrent_requests);
//! # Ok::<(), tilewarm::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_log_directory, DEFAULT_DEGRADED_THRESHOLD, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_FILE,
    DEFAULT_MIN_SAMPLES,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, HealthSettings, HttpSettings, LoggingSettings};
