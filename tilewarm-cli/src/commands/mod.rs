//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, show, path)
//! - [`plan`] - Offline prefetch plan for a viewport
//! - [`warm`] - Warm the tile cache around a viewport

pub mod common;
pub mod config;
pub mod plan;
pub mod warm;
