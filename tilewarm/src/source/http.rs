//! Cache-warming HTTP requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use super::types::SourceError;

/// Default User-Agent string for warm requests.
pub const DEFAULT_USER_AGENT: &str = concat!("tilewarm/", env!("CARGO_PKG_VERSION"));

/// Default request timeout for warm requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a cache-warming request did not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarmError {
    /// No response was received.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body could not be read to completion.
    #[error("Failed to read response: {0}")]
    Body(String),
}

/// Issues a request whose only purpose is to populate a cache.
///
/// The response content is never handed back: an implementation reports
/// only whether the tile is now cached.
pub trait TileWarmer: Send + Sync {
    /// Request `url` and classify the outcome.
    fn warm(&self, url: &str) -> impl Future<Output = Result<(), WarmError>> + Send;
}

impl<T: TileWarmer> TileWarmer for Arc<T> {
    fn warm(&self, url: &str) -> impl Future<Output = Result<(), WarmError>> + Send {
        (**self).warm(url)
    }
}

/// [`TileWarmer`] backed by an async reqwest client.
#[derive(Clone)]
pub struct ReqwestWarmer {
    client: reqwest::Client,
}

impl ReqwestWarmer {
    /// Create a warmer with the default timeout and User-Agent.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a warmer with a custom timeout and User-Agent.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// The underlying client, shared with control-plane requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl TileWarmer for ReqwestWarmer {
    async fn warm(&self, url: &str) -> Result<(), WarmError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WarmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WarmError::Status(status.as_u16()));
        }

        // Drain the body so the transfer completes and intermediate caches
        // store the full tile; the bytes themselves are discarded.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WarmError::Body(e.to_string()))?;

        trace!(url = url, bytes = bytes.len(), "Warm request complete");
        Ok(())
    }
}
