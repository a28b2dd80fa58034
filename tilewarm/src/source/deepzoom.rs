//! DeepZoom (DZI) tile source.
//!
//! Describes an image served through the tile server's DeepZoom endpoints:
//!
//! ```text
//! GET {base}/deepzoom/{image_id}/info                      -> JSON descriptor
//! GET {base}/deepzoom/{image_id}_files/{level}/{x}_{y}.{fmt} -> tile
//! ```
//!
//! DeepZoom level 0 is a 1×1 pixel image and each level doubles in size up
//! to `maxLevel`, which is the full-resolution image.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{SourceError, TileSource};

/// JSON descriptor returned by the `/deepzoom/{image_id}/info` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DziInfo {
    /// Tile encoding, used as the URL extension (e.g. "jpeg").
    pub format: String,
    /// Tile overlap in pixels.
    #[serde(default)]
    pub overlap: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Full-resolution width in pixels.
    pub width: u64,
    /// Full-resolution height in pixels.
    pub height: u64,
    /// Number of levels stored natively by the server, if reported.
    #[serde(default)]
    pub levels: Option<u32>,
    /// Highest DeepZoom level (`ceil(log2(max(width, height)))`).
    pub max_level: u32,
}

impl DziInfo {
    /// Parse a descriptor from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A [`TileSource`] backed by a DeepZoom descriptor.
#[derive(Debug, Clone)]
pub struct DeepZoomSource {
    base_url: String,
    image_id: String,
    info: DziInfo,
}

impl DeepZoomSource {
    /// Create a source from an already-fetched descriptor.
    pub fn new(base_url: impl Into<String>, image_id: impl Into<String>, info: DziInfo) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            image_id: image_id.into(),
            info,
        }
    }

    /// URL of the JSON descriptor for `image_id`.
    pub fn info_url(base_url: &str, image_id: &str) -> String {
        format!(
            "{}/deepzoom/{}/info",
            base_url.trim_end_matches('/'),
            image_id
        )
    }

    /// Fetch the descriptor from the tile server and build a source.
    ///
    /// This is a control-plane request: failures are returned as
    /// [`SourceError`] so the caller can classify them.
    pub async fn fetch(
        client: &reqwest::Client,
        base_url: &str,
        image_id: &str,
    ) -> Result<Self, SourceError> {
        let url = Self::info_url(base_url, image_id);
        debug!(url = %url, "Fetching DeepZoom descriptor");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let token_expired = status.as_u16() == 401 && token_expiry_hint(response).await;
            warn!(
                url = %url,
                status = status.as_u16(),
                token_expired,
                "DeepZoom descriptor request rejected"
            );
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
                token_expired,
            });
        }

        let body = response.text().await.map_err(|e| SourceError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let info = DziInfo::from_json(&body).map_err(|e| SourceError::InvalidInfo {
            url: url.clone(),
            message: e.to_string(),
        })?;

        debug!(
            url = %url,
            width = info.width,
            height = info.height,
            tile_size = info.tile_size,
            max_level = info.max_level,
            "DeepZoom descriptor loaded"
        );

        Ok(Self::new(base_url, image_id, info))
    }

    pub fn info(&self) -> &DziInfo {
        &self.info
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }
}

impl TileSource for DeepZoomSource {
    fn tile_url(&self, level: u32, x: u32, y: u32) -> String {
        format!(
            "{}/deepzoom/{}_files/{}/{}_{}.{}",
            self.base_url, self.image_id, level, x, y, self.info.format
        )
    }

    fn level_scale(&self, level: u32) -> f64 {
        2f64.powi(level as i32 - self.info.max_level as i32)
    }

    fn tile_size(&self, _level: u32) -> u32 {
        self.info.tile_size
    }

    fn image_width(&self) -> u64 {
        self.info.width
    }

    fn image_height(&self) -> u64 {
        self.info.height
    }

    fn max_level(&self) -> u32 {
        self.info.max_level
    }
}

/// Inspect a 401 response for signs that the token expired, as opposed to
/// being missing or malformed.
async fn token_expiry_hint(response: reqwest::Response) -> bool {
    let header_hint = response
        .headers()
        .get(reqwest::header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(mentions_expiry)
        .unwrap_or(false);

    if header_hint {
        return true;
    }

    response
        .text()
        .await
        .map(|body| mentions_expiry(&body))
        .unwrap_or(false)
}

fn mentions_expiry(text: &str) -> bool {
    text.to_ascii_lowercase().contains("expired")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> DziInfo {
        DziInfo {
            format: "jpeg".to_string(),
            overlap: 0,
            tile_size: 256,
            width: 40000,
            height: 30000,
            levels: Some(9),
            max_level: 16,
        }
    }

    #[test]
    fn test_parse_server_descriptor() {
        let json = r#"{
            "format": "jpeg",
            "overlap": 0,
            "tileSize": 254,
            "width": 92344,
            "height": 71130,
            "levels": 10,
            "maxLevel": 17
        }"#;

        let info = DziInfo::from_json(json).unwrap();
        assert_eq!(info.tile_size, 254);
        assert_eq!(info.width, 92344);
        assert_eq!(info.levels, Some(10));
        assert_eq!(info.max_level, 17);
    }

    #[test]
    fn test_parse_descriptor_without_optional_fields() {
        let json = r#"{"format":"png","tileSize":512,"width":1000,"height":800,"maxLevel":10}"#;
        let info = DziInfo::from_json(json).unwrap();
        assert_eq!(info.overlap, 0);
        assert_eq!(info.levels, None);
    }

    #[test]
    fn test_parse_rejects_missing_size() {
        let json = r#"{"format":"png","tileSize":512,"maxLevel":10}"#;
        assert!(DziInfo::from_json(json).is_err());
    }

    #[test]
    fn test_tile_url_layout() {
        let source = DeepZoomSource::new("http://slides.local:8000/", "case-12/slide.svs", sample_info());
        assert_eq!(
            source.tile_url(14, 3, 7),
            "http://slides.local:8000/deepzoom/case-12/slide.svs_files/14/3_7.jpeg"
        );
    }

    #[test]
    fn test_info_url_layout() {
        assert_eq!(
            DeepZoomSource::info_url("http://host/", "a.svs"),
            "http://host/deepzoom/a.svs/info"
        );
    }

    #[test]
    fn test_level_scale_halves_per_level() {
        let source = DeepZoomSource::new("http://host", "a", sample_info());
        assert_eq!(source.level_scale(16), 1.0);
        assert_eq!(source.level_scale(15), 0.5);
        assert_eq!(source.level_scale(0), 2f64.powi(-16));
        assert_eq!(source.max_level(), 16);
    }

    #[test]
    fn test_grid_matches_image_size() {
        let source = DeepZoomSource::new("http://host", "a", sample_info());
        let grid = crate::coord::grid_size(&source, 16);
        // 40000 / 256 = 156.25 -> 157, 30000 / 256 = 117.19 -> 118
        assert_eq!(grid.columns, 157);
        assert_eq!(grid.rows, 118);
    }

    #[test]
    fn test_mentions_expiry() {
        assert!(mentions_expiry("Token has expired"));
        assert!(mentions_expiry(
            r#"Bearer error="invalid_token", error_description="The token EXPIRED""#
        ));
        assert!(!mentions_expiry("Authorization header missing"));
    }
}
