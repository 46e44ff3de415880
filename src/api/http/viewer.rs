use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::{core::ViewerConfig, databricks::utils::files_url};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParams {
    file_path: Option<String>,
    source_layer: Option<String>,
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingParameter(name))
}

/// Resolve a Volumes file path into the descriptor the map frontend loads.
pub async fn config(
    State(state): State<AppState>,
    Query(params): Query<ConfigParams>,
) -> Result<Json<ViewerConfig>, ApiError> {
    let file_path = required(params.file_path, "filePath")?;
    let source_layer = required(params.source_layer, "sourceLayer")?;
    let host = state.host.as_deref().ok_or(ApiError::HostNotConfigured)?;

    let upstream = files_url(host, &file_path);
    Ok(Json(ViewerConfig::new(&upstream, &source_layer, &state.viewer)))
}
