use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    StatusCode,
};
use serde::Serialize;

/// Path the proxy is mounted on.
pub const PROXY_PATH: &str = "/proxy/pmtiles";

pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 14;

/// A remote store that serves whole files or byte ranges of them.
#[async_trait::async_trait]
pub trait TileStore: Send + Sync {
    async fn fetch_range(&self, request: RangeRequest<'_>) -> Result<RangeResponse, anyhow::Error>;
}

/// A read of `url`, whole or by range.
#[derive(Debug, Clone, Copy)]
pub struct RangeRequest<'a> {
    pub url: &'a str,
    /// Forwarded byte for byte.
    pub range: Option<&'a HeaderValue>,
    /// The caller's own workspace token, used when the service has none.
    pub user_token: Option<&'a str>,
}

/// Upstream answer to a (possibly ranged) read.
pub struct RangeResponse {
    pub status: StatusCode,
    /// Only the range related headers worth forwarding.
    pub headers: HeaderMap,
    /// Owns the upstream connection; dropping it releases the connection.
    pub body: BoxStream<'static, Result<Bytes, std::io::Error>>,
}

impl RangeResponse {
    pub fn is_partial(&self) -> bool {
        self.status == StatusCode::PARTIAL_CONTENT
    }
}

/// URL of this proxy for the given upstream file.
pub fn proxy_url(target: &str) -> String {
    let query = serde_urlencoded::to_string([("url", target)]).unwrap_or_default();
    format!("{}?{}", PROXY_PATH, query)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerDefaults {
    pub base_map_url: String,
    pub zoom: u8,
}

/// What the map frontend needs to find its tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    pub pmtiles_url: String,
    pub source_layer: String,
    pub base_map_url: String,
    pub zoom: u8,
}

impl ViewerConfig {
    pub fn new(upstream_url: &str, source_layer: &str, defaults: &ViewerDefaults) -> Self {
        Self {
            pmtiles_url: proxy_url(upstream_url),
            source_layer: source_layer.to_owned(),
            base_map_url: defaults.base_map_url.clone(),
            zoom: defaults.zoom,
        }
    }
}

/// Collection metadata answered to clients that probe before reading ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileJson {
    pub tilejson: &'static str,
    pub tiles: Vec<String>,
    pub minzoom: u8,
    pub maxzoom: u8,
}

impl TileJson {
    pub fn for_target(target: &str) -> Self {
        Self {
            tilejson: "3.0.0",
            tiles: vec![proxy_url(target)],
            minzoom: MIN_ZOOM,
            maxzoom: MAX_ZOOM,
        }
    }
}
