//! Lockbox server.
//!
//! Wires the token service, authorization interceptor, auth service and
//! resource engine together behind the HTTP transport.
//!
//! # Layers
//! - [`interceptor`]: verifies the bearer token of every protected call
//! - [`service`]: RPC handlers over typed messages
//! - [`engine`]: owner-scoped resource CRUD and file transfer
//! - [`http`]: routes, metadata extraction and stream plumbing

pub mod auth;
pub mod config;
pub mod context;
pub mod engine;
pub mod http;
pub mod interceptor;
pub mod service;
pub mod stream;

pub use auth::AuthService;
pub use config::ServerConfig;
pub use context::{Caller, RequestContext};
pub use engine::ResourceEngine;
pub use interceptor::AuthInterceptor;
pub use service::VaultService;
pub use stream::{AuthenticatedStream, InboundStream, OutboundStream, ServerStream};

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use lockbox_common::Result;
use lockbox_crypto::TokenService;
use lockbox_storage::{Database, LocalBlobStore};

/// A fully wired server.
pub struct Server {
    interceptor: AuthInterceptor,
    service: VaultService,
}

impl Server {
    pub fn new(interceptor: AuthInterceptor, service: VaultService) -> Self {
        Self {
            interceptor,
            service,
        }
    }

    /// Open storage and build every component from configuration.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Database or file store cannot be opened
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let db = Database::open(&config.database_path)?;
        let blobs = LocalBlobStore::new(&config.file_store_path)?;
        info!(
            database = %config.database_path.display(),
            files = %config.file_store_path.display(),
            "Storage ready"
        );

        let tokens = TokenService::new(&config.signing_key()?);
        let auth = AuthService::new(db.clone(), tokens.clone(), config.token_ttl());
        let engine =
            ResourceEngine::new(db, Arc::new(blobs)).with_chunk_size(config.chunk_size);

        Ok(Self::new(
            AuthInterceptor::new(tokens),
            VaultService::new(auth, engine),
        ))
    }

    pub fn router(&self) -> Router {
        http::router(self.interceptor.clone(), self.service.clone())
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let app = self.router();
        http::serve(listener, app, shutdown).await
    }
}
