//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, Result};

/// Default server address.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3200";

fn default_retry_interval_secs() -> u64 {
    5
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the server.
    pub server_url: String,
    /// Delay between failed token renewal attempts, in seconds.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Where downloaded files are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            retry_interval_secs: default_retry_interval_secs(),
            download_dir: default_download_dir(),
        }
    }
}

impl ClientConfig {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Parsed server URL.
    ///
    /// # Errors
    /// - Not an absolute http(s) URL
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| ClientError::InvalidInput(format!("server_url: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::InvalidInput(format!(
                "server_url: unsupported scheme {}",
                other
            ))),
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }
}
