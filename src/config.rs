//! Process configuration, read once from the environment at startup.

use crate::core::ViewerDefaults;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BASE_MAP_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_ZOOM: u8 = 12;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid PORT value {0:?}")]
    InvalidPort(String),
    #[error("invalid DEFAULT_ZOOM value {0:?}")]
    InvalidZoom(String),
}

/// Credentials for the client credentials grant against the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Absent when any of the three credential variables is missing.
    pub credentials: Option<Credentials>,
    pub host: Option<String>,
    pub viewer: ViewerDefaults,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.trim().parse().map_err(|_| Error::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };

        let zoom = match var("DEFAULT_ZOOM") {
            Some(zoom) => zoom.trim().parse().map_err(|_| Error::InvalidZoom(zoom))?,
            None => DEFAULT_ZOOM,
        };

        let host = var("DATABRICKS_HOST");
        let credentials = match (
            var("DATABRICKS_CLIENT_ID"),
            var("DATABRICKS_CLIENT_SECRET"),
            host.clone(),
        ) {
            (Some(client_id), Some(client_secret), Some(host)) => Some(Credentials {
                client_id,
                client_secret,
                host,
            }),
            _ => None,
        };

        let viewer = ViewerDefaults {
            base_map_url: var("BASE_MAP_URL").unwrap_or_else(|| DEFAULT_BASE_MAP_URL.to_owned()),
            zoom,
        };

        Ok(Self {
            port,
            credentials,
            host,
            viewer,
        })
    }
}
