//! HTTP surface: the range proxy, viewer configuration and health.

mod error;
pub mod health;
pub mod proxy;
pub mod viewer;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::core::{TileStore, ViewerDefaults, PROXY_PATH};

pub use self::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TileStore>,
    /// Workspace host used to resolve viewer file paths.
    pub host: Option<String>,
    pub viewer: ViewerDefaults,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PROXY_PATH, get(proxy::fetch).options(proxy::preflight))
        .route("/api/config", get(viewer::config))
        .route("/api/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::databricks::tests::files;

    pub fn app_with_token(host: Option<&str>, token: Option<&'static str>) -> Router {
        router(AppState {
            store: Arc::new(files(token)),
            host: host.map(str::to_owned),
            viewer: ViewerDefaults {
                base_map_url: "https://tiles.example/{z}/{x}/{y}.png".into(),
                zoom: 12,
            },
        })
    }

    pub fn app(host: Option<&str>) -> Router {
        app_with_token(host, Some("tok"))
    }
}
