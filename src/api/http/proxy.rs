use std::borrow::Cow;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, AppState};
use crate::core::{RangeRequest, TileJson};

/// Set by the Databricks Apps front end to the signed-in user's token.
const FORWARDED_ACCESS_TOKEN: &str = "x-forwarded-access-token";

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    url: Option<String>,
}

fn cors_headers() -> [(header::HeaderName, HeaderValue); 3] {
    [
        (
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, HEAD, OPTIONS"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Range, Authorization"),
        ),
    ]
}

/// Undo a leftover layer of percent-encoding; keep the raw value if that fails.
///
/// A value that already reads as a URL is left alone so encoded path
/// segments survive.
fn decode_target(raw: &str) -> Cow<'_, str> {
    if raw.contains("://") {
        return Cow::Borrowed(raw);
    }
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Tile clients probe for JSON metadata before they start reading ranges.
fn wants_metadata(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .map_or(false, |accept| accept.contains("application/json"))
}

/// Forward a (possibly ranged) read of `url` upstream and stream the answer back.
pub async fn fetch(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let raw = params
        .url
        .filter(|url| !url.is_empty())
        .ok_or(ApiError::MissingParameter("URL"))?;
    let target = decode_target(&raw);
    let range = headers.get(header::RANGE);
    let user_token = headers
        .get(FORWARDED_ACCESS_TOKEN)
        .and_then(|token| token.to_str().ok())
        .filter(|token| !token.is_empty());

    if range.is_none() && wants_metadata(&headers) {
        debug!(message = "Answering metadata probe", target = %target);
        return Ok((cors_headers(), Json(TileJson::for_target(&target))).into_response());
    }

    let upstream = state
        .store
        .fetch_range(RangeRequest {
            url: &target,
            range,
            user_token,
        })
        .await
        .map_err(ApiError::Upstream)?;

    let status = if upstream.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = Response::new(Body::from_stream(upstream.body));
    *response.status_mut() = status;
    let response_headers = response.headers_mut();
    response_headers.extend(upstream.headers);
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response_headers.extend(cors_headers());

    Ok(response)
}

/// CORS preflight; never touches upstream.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, cors_headers())
}
