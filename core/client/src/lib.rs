//! Lockbox client library.
//!
//! [`Client`] bundles the pieces a caller needs: an HTTP transport, the
//! shared token holder, a session that keeps the token renewed, and a
//! typed resource client that attaches the token to every call.
//!
//! ```no_run
//! # async fn demo() -> lockbox_client::Result<()> {
//! use lockbox_client::{Client, ClientConfig};
//! use lockbox_common::{Credentials, ResourceKind};
//!
//! let client = Client::connect(&ClientConfig::default())?;
//! client.login(Credentials::new("alice", "hunter2")).await?;
//! for item in client.resources().list(ResourceKind::CredentialPair).await? {
//!     println!("{}", item.id);
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod model;
pub mod refresher;
pub mod resources;
pub mod token;
pub mod transport;

pub use auth::{AuthApi, AuthSession};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use interceptor::TokenInjector;
pub use model::{CardRecord, CredentialPair, Fetched, Payload};
pub use refresher::{renewal_delay, TokenRefresher};
pub use resources::ResourceClient;
pub use token::TokenHolder;
pub use transport::HttpTransport;

use std::sync::Arc;

use lockbox_common::{Credentials, TokenData};

/// A connection to one server on behalf of one user.
pub struct Client {
    session: AuthSession,
    resources: ResourceClient,
}

impl Client {
    /// Build a client for the configured server. No request is made yet.
    ///
    /// # Errors
    /// - `InvalidInput` if the server URL is not http(s)
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.server_url()?)?;
        let holder = TokenHolder::new();
        let session = AuthSession::new(
            Arc::new(transport.clone()),
            holder.clone(),
            config.retry_interval(),
        );
        let resources = ResourceClient::new(transport, TokenInjector::new(holder));
        Ok(Self { session, resources })
    }

    pub async fn register(&self, credentials: Credentials) -> Result<TokenData> {
        self.session.register(credentials).await
    }

    pub async fn login(&self, credentials: Credentials) -> Result<TokenData> {
        self.session.login(credentials).await
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn resources(&self) -> &ResourceClient {
        &self.resources
    }

    /// Stop background token renewal.
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}
