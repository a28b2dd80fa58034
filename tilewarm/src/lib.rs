//! tilewarm - Predictive tile delivery for deep-zoom image viewers
//!
//! Keeps a multi-resolution viewer responsive over an unreliable network:
//! it predicts which tiles will be needed next, warms the cache for them
//! under bounded concurrency, tracks delivery health of the tiles actually
//! rendered, and classifies failures into recovery actions.
//!
//! # High-Level API
//!
//! [`prefetch::PrefetchEngine`] is the entry point. The viewer shell feeds it
//! viewport events and rendered-tile outcomes, and listens for recovery
//! decisions:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilewarm::prefetch::{PrefetchConfig, PrefetchEngine, SharedViewport};
//! use tilewarm::source::{DeepZoomSource, ReqwestWarmer};
//!
//! let warmer = ReqwestWarmer::new()?;
//! let source = DeepZoomSource::fetch(warmer.client(), base_url, image_id).await?;
//! let engine = PrefetchEngine::new(viewport, warmer, PrefetchConfig::default())?;
//!
//! engine.on_image_open(Arc::new(source));
//! engine.on_viewport_change();
//! engine.record_tile_outcome(true);
//! ```

pub mod config;
pub mod coord;
pub mod health;
pub mod logging;
pub mod prefetch;
pub mod source;

/// Version of the tilewarm library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
