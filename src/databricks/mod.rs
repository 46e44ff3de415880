//! Databricks workspace access: authenticated ranged reads through the Files API.

use futures::TryStreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, error, warn};

use self::{
    auth::Token,
    utils::{check_status, ServerError},
};
use crate::core::{RangeRequest, RangeResponse};

pub mod auth;
pub mod utils;

pub const USER_AGENT: &str = concat!("pmtiles-proxy/", env!("CARGO_PKG_VERSION"));

/// Upstream response headers copied onto the proxied response.
const FORWARDED_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_RANGE,
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
];

pub struct Files<AuthTokenProvider> {
    pub client: reqwest::Client,
    pub auth_token_provider: AuthTokenProvider,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
}

impl<AuthTokenProvider> Files<AuthTokenProvider>
where
    AuthTokenProvider: auth::TokenProvider,
{
    fn build_request(
        &self,
        auth_token: Option<&str>,
        url: &str,
        range: Option<&HeaderValue>,
    ) -> Result<reqwest::Request, Error> {
        let builder = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT);

        let builder = match auth_token {
            Some(auth_token) => builder.bearer_auth(auth_token),
            None => builder,
        };

        let builder = match range {
            Some(range) => builder.header(header::RANGE, range.clone()),
            None => builder,
        };

        builder.build().map_err(Error::Reqwest)
    }

    /// The service token when one can be had, else the caller's forwarded
    /// token; upstream requests go out without one otherwise.
    async fn get_auth_token(&self, user_token: Option<&str>) -> Option<String> {
        let err = match self.auth_token_provider.get_auth_token().await {
            Ok(token) => return Some(token.access_token().to_owned()),
            Err(err) => err,
        };
        match user_token {
            Some(user_token) => {
                debug!(message = "Using forwarded user token", reason = %err);
                Some(user_token.to_owned())
            }
            None => {
                warn!(message = "Forwarding without authorization", reason = %err);
                None
            }
        }
    }

    async fn exec(&self, request: reqwest::Request) -> Result<reqwest::Response, Error> {
        let res = self.client.execute(request).await.map_err(Error::Reqwest)?;
        check_status(&res)?;
        Ok(res)
    }

    pub async fn get_range(&self, request: RangeRequest<'_>) -> Result<RangeResponse, Error> {
        let RangeRequest {
            url,
            range,
            user_token,
        } = request;
        let auth_token = self.get_auth_token(user_token).await;
        let request = self.build_request(auth_token.as_deref(), url, range)?;
        let res = self.exec(request).await?;

        debug!(message = "Upstream responded", status = %res.status(), range = ?range);

        let status = res.status();
        let mut headers = HeaderMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = res.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }

        let body = res
            .bytes_stream()
            .inspect_err(|err| error!(message = "Upstream body stream failed", error = %err))
            .map_err(std::io::Error::other);

        Ok(RangeResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

#[async_trait::async_trait]
impl<AuthTokenProvider> crate::core::TileStore for Files<AuthTokenProvider>
where
    AuthTokenProvider: auth::TokenProvider,
{
    async fn fetch_range(&self, request: RangeRequest<'_>) -> Result<RangeResponse, anyhow::Error> {
        let response = self.get_range(request).await?;
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{Duration, Instant};

    use futures::StreamExt;
    use wiremock::{
        matchers::{header as header_is, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::core::TileStore;
    use crate::databricks::auth::token_manager::{self, Record};

    /// Always answers with the same token, or none at all.
    pub struct StaticToken(pub Option<&'static str>);

    #[async_trait::async_trait]
    impl auth::TokenProvider for StaticToken {
        type Token = Record;
        type Error = token_manager::Error;

        async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
            let access_token = self.0.ok_or(token_manager::Error::Unavailable)?;
            Ok(Record {
                access_token: access_token.to_owned(),
                expires_at: Instant::now() + Duration::from_secs(3600),
            })
        }
    }

    pub fn files(token: Option<&'static str>) -> Files<StaticToken> {
        Files {
            client: reqwest::Client::new(),
            auth_token_provider: StaticToken(token),
        }
    }

    async fn collect(response: RangeResponse) -> Vec<u8> {
        response
            .body
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await
    }

    fn request<'a>(
        url: &'a str,
        range: Option<&'a HeaderValue>,
        user_token: Option<&'a str>,
    ) -> RangeRequest<'a> {
        RangeRequest {
            url,
            range,
            user_token,
        }
    }

    #[tokio::test]
    async fn forwards_range_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/fs/files/Volumes/a/b.pmtiles"))
            .and(header_is("range", "bytes=0-3"))
            .and(header_is("authorization", "Bearer tok"))
            .and(header_is("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 0-3/100")
                    .insert_header("accept-ranges", "bytes")
                    .insert_header("x-unrelated", "dropped")
                    .set_body_bytes(b"PMTi".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/2.0/fs/files/Volumes/a/b.pmtiles", server.uri());
        let range = HeaderValue::from_static("bytes=0-3");
        let response = files(Some("tok"))
            .fetch_range(request(&url, Some(&range), None))
            .await
            .unwrap();

        assert!(response.is_partial());
        assert_eq!(response.headers[header::CONTENT_RANGE], "bytes 0-3/100");
        assert_eq!(response.headers[header::ACCEPT_RANGES], "bytes");
        assert!(response.headers.get("x-unrelated").is_none());
        assert_eq!(collect(response).await, b"PMTi");
    }

    #[tokio::test]
    async fn no_token_means_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"whole".to_vec()))
            .mount(&server)
            .await;

        let url = format!("{}/file.pmtiles", server.uri());
        let response = files(None)
            .fetch_range(request(&url, None, None))
            .await
            .unwrap();
        assert!(!response.is_partial());
        assert_eq!(collect(response).await, b"whole");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
        assert!(!requests[0].headers.contains_key("range"));
    }

    #[tokio::test]
    async fn user_token_fills_in_for_missing_service_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_is("authorization", "Bearer user-tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/file.pmtiles", server.uri());
        let response = files(None)
            .fetch_range(request(&url, None, Some("user-tok")))
            .await
            .unwrap();
        assert_eq!(response.status, reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn service_token_wins_over_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_is("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/file.pmtiles", server.uri());
        files(Some("tok"))
            .fetch_range(request(&url, None, Some("user-tok")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing.pmtiles", server.uri());
        let err = files(Some("tok"))
            .get_range(request(&url, None, None))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Server(ServerError { status_code: 404 })));
    }
}
