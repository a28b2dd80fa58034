//! Tile source capability and control-plane errors.

use thiserror::Error;

use crate::health::ErrorSignal;

/// Capability contract for a pyramidal image served as tiles.
///
/// Implementors describe the pyramid geometry and know how to address a
/// single tile. Nothing here performs I/O; callers use the URL with a
/// [`TileWarmer`](super::TileWarmer) or their own request path.
pub trait TileSource: Send + Sync {
    /// URL of the tile at column `x`, row `y` of `level`.
    fn tile_url(&self, level: u32, x: u32, y: u32) -> String;

    /// Fraction of full resolution represented by `level` (1.0 = full size).
    fn level_scale(&self, level: u32) -> f64;

    /// Edge length in pixels of the tiles at `level`.
    fn tile_size(&self, level: u32) -> u32;

    /// Full-resolution image width in pixels.
    fn image_width(&self) -> u64;

    /// Full-resolution image height in pixels.
    fn image_height(&self) -> u64;

    /// Highest valid level index. Levels run from 0 to this value inclusive.
    fn max_level(&self) -> u32;
}

/// Errors from control-plane requests (image info, metadata, health checks).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to construct the HTTP client.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: u16,
        /// Set when the response indicates the bearer token has expired.
        token_expired: bool,
    },

    /// The response body could not be understood.
    #[error("Invalid image info from {url}: {message}")]
    InvalidInfo { url: String, message: String },
}

impl SourceError {
    /// Convert into the raw signal consumed by the error classifier.
    pub fn to_signal(&self) -> ErrorSignal {
        match self {
            SourceError::Client(message) => ErrorSignal::NetworkFailure {
                endpoint: String::new(),
                message: message.clone(),
            },
            SourceError::Network { url, message } => ErrorSignal::NetworkFailure {
                endpoint: url.clone(),
                message: message.clone(),
            },
            SourceError::Status {
                url,
                status,
                token_expired,
            } => ErrorSignal::HttpStatus {
                endpoint: url.clone(),
                status: *status,
                token_expired: *token_expired,
            },
            SourceError::InvalidInfo { url, message } => ErrorSignal::NetworkFailure {
                endpoint: url.clone(),
                message: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_token_hint() {
        let err = SourceError::Status {
            url: "http://host/deepzoom/a/info".to_string(),
            status: 401,
            token_expired: true,
        };

        match err.to_signal() {
            ErrorSignal::HttpStatus {
                status,
                token_expired,
                ..
            } => {
                assert_eq!(status, 401);
                assert!(token_expired);
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[test]
    fn test_network_error_maps_to_network_failure() {
        let err = SourceError::Network {
            url: "http://host/info".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(matches!(
            err.to_signal(),
            ErrorSignal::NetworkFailure { ref endpoint, .. } if endpoint == "http://host/info"
        ));
    }

    #[test]
    fn test_error_display() {
        let err = SourceError::Status {
            url: "http://host/x".to_string(),
            status: 503,
            token_expired: false,
        };
        assert_eq!(err.to_string(), "HTTP 503 from http://host/x");
    }
}
