//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilewarm::config::ConfigFileError;
use tilewarm::health::{classify, RecoveryAction};
use tilewarm::prefetch::PrefetchError;
use tilewarm::source::SourceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line input
    InvalidInput(String),
    /// Failed to read an input file
    FileRead { path: String, error: std::io::Error },
    /// Control-plane request to the tile server failed
    Source(SourceError),
    /// Prefetch engine rejected its setup
    Engine(PrefetchError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Source(e) => {
                let state = classify(&e.to_signal());
                eprintln!();
                eprintln!("Category: {}", state.category);
                eprintln!("Action:   {}", state.policy().action.display_status());
                match state.policy().action {
                    RecoveryAction::Reauthenticate => {
                        eprintln!();
                        eprintln!("The access token was rejected. Sign in again and retry.");
                    }
                    RecoveryAction::UserRetry | RecoveryAction::SilentRetry => {
                        eprintln!();
                        eprintln!("Common issues:");
                        eprintln!("  1. Tile server unreachable: check --base-url");
                        eprintln!("  2. Server overloaded: retry in a few moments");
                    }
                    RecoveryAction::DismissibleNotice => {}
                }
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'tilewarm config show' to see the effective settings.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::Source(e) => write!(f, "Tile server request failed: {}", e),
            CliError::Engine(e) => write!(f, "Failed to start prefetch engine: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::FileRead { error, .. } => Some(error),
            CliError::Source(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}

impl From<PrefetchError> for CliError {
    fn from(e: PrefetchError) -> Self {
        CliError::Engine(e)
    }
}
