//! Server configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use lockbox_common::{Error, Result};
use lockbox_crypto::SigningKey;

/// Environment variable overriding the configured signing key.
pub const SIGNING_KEY_ENV: &str = "LOCKBOX_SIGNING_KEY";

/// Upper bound on token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3200))
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_chunk_size() -> usize {
    4096
}

/// Server configuration, loaded from a JSON file.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Directory holding file contents.
    pub file_store_path: PathBuf,
    /// Token signing secret. Never logged.
    #[serde(default)]
    pub signing_key: String,
    /// Lifetime of issued tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Largest data frame sent by GetFile.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl ServerConfig {
    /// Create a configuration with defaults for everything but the paths and key.
    pub fn new(
        database_path: impl Into<PathBuf>,
        file_store_path: impl Into<PathBuf>,
        signing_key: impl Into<String>,
    ) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_path: database_path.into(),
            file_store_path: file_store_path.into(),
            signing_key: signing_key.into(),
            token_ttl_secs: default_token_ttl_secs(),
            chunk_size: default_chunk_size(),
        }
    }

    /// Load a configuration file, apply the environment override and validate.
    ///
    /// # Errors
    /// - File unreadable or not valid JSON
    /// - Validation failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: ServerConfig = serde_json::from_str(&raw)?;
        if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
            config.signing_key = key;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.signing_key.is_empty() {
            return Err(Error::InvalidInput(format!(
                "signing_key is empty; set it in the config or via {}",
                SIGNING_KEY_ENV
            )));
        }
        if self.token_ttl_secs == 0 || self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(Error::InvalidInput(format!(
                "token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput("chunk_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_bytes(self.signing_key.as_bytes().to_vec())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("database_path", &self.database_path)
            .field("file_store_path", &self.file_store_path)
            .field("signing_key", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_minimal_json() {
        let json = r#"{"database_path":"db.sqlite","file_store_path":"files","signing_key":"k"}"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.listen_addr, default_listen_addr());
        assert_eq!(config.token_ttl_secs, 3600);
        assert_eq!(config.chunk_size, 4096);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ServerConfig::new("db", "files", "");
        assert!(config.validate().is_err());
        config.signing_key = "k".to_string();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
        config.chunk_size = 1;
        config.token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.json");
        let config = ServerConfig::new("db", "files", "from-file");
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = ServerConfig::load(&path).unwrap();
        assert_eq!(loaded.database_path, PathBuf::from("db"));
        assert!(!loaded.signing_key.is_empty());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ServerConfig::new("db", "files", "very-secret");
        assert!(!format!("{:?}", config).contains("very-secret"));
    }
}
