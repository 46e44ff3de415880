//! Authorize using the client credentials flow against the workspace OIDC endpoint.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::databricks::utils::{check_status, workspace_url, ServerError};

/// Lifetime assumed when the server leaves `expires_in` out.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
    #[error("encoding form: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}

pub struct ClientCredentials {
    pub client: reqwest::Client,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub token_url: String,
}

impl ClientCredentials {
    pub fn for_workspace(
        client: reqwest::Client,
        host: &str,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            scope: "all-apis".into(),
            token_url: format!("{}/oidc/v1/token", workspace_url(host)),
        }
    }

    /// Perform the client credentials flow.
    pub async fn perform(&self) -> Result<AuthResponse, Error> {
        let params = &[
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];
        let params = serde_urlencoded::to_string(params)?;

        let req = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(params)
            .build()?;

        let res = self.client.execute(req).await?;
        check_status(&res)?;
        let login_response = res.json().await?;
        Ok(login_response)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    access_token: String,
    /// Seconds the token stays valid.
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at: Instant,
}

impl From<AuthResponse> for Token {
    fn from(auth: AuthResponse) -> Self {
        let AuthResponse {
            access_token,
            expires_in,
        } = auth;
        let expires_in = Duration::from_secs(expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        Self {
            access_token,
            expires_at: Instant::now() + expires_in,
        }
    }
}

#[async_trait::async_trait]
impl super::TokenProvider for ClientCredentials {
    type Token = Token;
    type Error = Error;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
        let auth_response = self.perform().await?;
        Ok(auth_response.into())
    }
}

impl super::Token for Token {
    fn access_token(&self) -> &str {
        self.access_token.as_str()
    }
}

impl super::ExpiringToken for Token {
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}
