//! Tile source abstraction and HTTP plumbing.
//!
//! - [`TileSource`] describes a pyramidal image and addresses its tiles.
//! - [`DeepZoomSource`] implements it for the tile server's DeepZoom endpoints.
//! - [`TileWarmer`] issues cache-warming requests; [`ReqwestWarmer`] is the
//!   production implementation.

mod deepzoom;
mod http;
mod types;

pub use deepzoom::{DeepZoomSource, DziInfo};
pub use http::{ReqwestWarmer, TileWarmer, WarmError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use types::{SourceError, TileSource};

#[cfg(test)]
pub use http::tests::MockWarmer;
