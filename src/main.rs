use std::{net::SocketAddr, sync::Arc};

use pmtiles_proxy::{
    api::http::{self, AppState},
    config::Config,
    core::TileStore,
    databricks::{
        self,
        auth::{
            client_credentials::ClientCredentials,
            token_manager::{Disabled, TokenManager},
        },
    },
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let reqwest_client = reqwest::Client::builder()
        .user_agent(databricks::USER_AGENT)
        .build()?;

    let store: Arc<dyn TileStore> = match &config.credentials {
        Some(credentials) => {
            let auth_provider = ClientCredentials::for_workspace(
                reqwest_client.clone(),
                &credentials.host,
                credentials.client_id.clone(),
                credentials.client_secret.clone(),
            );
            let auth_provider = TokenManager::new(auth_provider);

            match auth_provider.fetch_token().await {
                Some(token) => info!(message = "Initial token acquired", token_expires_at = ?token.expires_at),
                None => warn!(message = "Initial token fetch failed, will retry on demand"),
            }

            Arc::new(databricks::Files {
                client: reqwest_client,
                auth_token_provider: auth_provider,
            })
        }
        None => {
            error!(
                message = "Missing Databricks credentials, proxying without authorization",
                required = "DATABRICKS_CLIENT_ID, DATABRICKS_CLIENT_SECRET, DATABRICKS_HOST",
            );
            Arc::new(databricks::Files {
                client: reqwest_client,
                auth_token_provider: Disabled,
            })
        }
    };

    let app = http::router(AppState {
        store,
        host: config.host.clone(),
        viewer: config.viewer.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(message = "Listening", addr = %listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
