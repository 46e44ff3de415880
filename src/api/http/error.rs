use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} parameter required")]
    MissingParameter(&'static str),
    #[error("Workspace host not configured")]
    HostNotConfigured,
    #[error("Failed to fetch PMTiles file")]
    Upstream(#[source] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::HostNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(err) => {
                error!(message = "Upstream fetch failed", error = ?err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
