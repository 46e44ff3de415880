use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::TokenProvider;

/// A token this close to expiry is refreshed before use.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Caches the provider's token and refreshes it lazily.
///
/// The cache lock is held across the refresh, so callers that find the token
/// stale at the same time share one fetch.
pub struct TokenManager<Provider>
where
    Provider: TokenProvider,
{
    provider: Provider,
    refresh_margin: Duration,
    cached_token: Mutex<Option<Record>>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no access token available")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Record {
    pub fn from_expiring_token<T: super::ExpiringToken>(token: T) -> Self {
        Self {
            access_token: token.access_token().to_owned(),
            expires_at: token.expires_at(),
        }
    }

    pub fn expires_within(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.expires_at
    }
}

impl super::Token for Record {
    fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl<Provider> TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: super::ExpiringToken,
{
    pub fn new(provider: Provider) -> Self {
        Self::with_refresh_margin(provider, REFRESH_MARGIN)
    }

    pub fn with_refresh_margin(provider: Provider, refresh_margin: Duration) -> Self {
        Self {
            provider,
            refresh_margin,
            cached_token: Mutex::const_new(None),
        }
    }

    /// Fetch a new token unconditionally.
    ///
    /// A failed fetch is logged and leaves the cache as it was.
    pub async fn fetch_token(&self) -> Option<Record> {
        let mut cached_token = self.cached_token.lock().await;
        self.refresh(&mut cached_token).await
    }

    /// The cached token if it is not about to expire, otherwise whatever is
    /// cached after one refresh attempt.
    ///
    /// When the refresh fails the previous token is returned even if it has
    /// already expired.
    pub async fn get_valid_token(&self) -> Option<Record> {
        let mut cached_token = self.cached_token.lock().await;

        match &*cached_token {
            Some(record) if !record.expires_within(self.refresh_margin) => {
                debug!(message = "Using preexisting token", token_expires_at = ?record.expires_at);
                return Some(record.clone());
            }
            Some(record) => {
                debug!(message = "Existing token close to expiry, refreshing", token_expires_at = ?record.expires_at);
            }
            None => {
                info!(message = "No active token found, about to get a new one");
            }
        }

        self.refresh(&mut cached_token).await
    }

    async fn refresh(&self, cached_token: &mut Option<Record>) -> Option<Record> {
        match self.provider.get_auth_token().await {
            Ok(token) => {
                let record = Record::from_expiring_token(token);
                debug!(message = "Got new token", token_expires_at = ?record.expires_at);
                cached_token.replace(record);
            }
            Err(err) => {
                error!(
                    message = "Failed to fetch access token",
                    error = %err,
                    token_is_stale = cached_token.is_some(),
                );
            }
        }
        cached_token.clone()
    }
}

#[async_trait::async_trait]
impl<Provider> super::TokenProvider for TokenManager<Provider>
where
    Provider: TokenProvider,
    <Provider as TokenProvider>::Token: super::ExpiringToken,
{
    type Token = Record;
    type Error = Error;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
        self.get_valid_token().await.ok_or(Error::Unavailable)
    }
}

/// Stands in for the manager when no credentials are configured.
pub struct Disabled;

#[async_trait::async_trait]
impl super::TokenProvider for Disabled {
    type Token = Record;
    type Error = Error;

    async fn get_auth_token(&self) -> Result<Self::Token, Self::Error> {
        Err(Error::Unavailable)
    }
}
