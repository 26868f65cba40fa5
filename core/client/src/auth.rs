//! Register and login, and the session that keeps the token fresh.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::refresher::TokenRefresher;
use crate::token::TokenHolder;
use crate::transport::HttpTransport;
use lockbox_common::{Credentials, Metadata, TokenData};
use lockbox_rpc::Method;

/// The two identity-bootstrap calls.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<TokenData>;

    async fn login(&self, credentials: &Credentials) -> Result<TokenData>;
}

#[async_trait]
impl AuthApi for HttpTransport {
    async fn register(&self, credentials: &Credentials) -> Result<TokenData> {
        self.unary(Method::Register, &Metadata::new(), credentials)
            .await
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenData> {
        self.unary(Method::Login, &Metadata::new(), credentials).await
    }
}

/// An authenticated session.
///
/// Every successful register or login stores the token in the shared
/// holder and makes sure the renewal loop is running.
pub struct AuthSession {
    api: Arc<dyn AuthApi>,
    holder: TokenHolder,
    refresher: TokenRefresher,
}

impl AuthSession {
    pub fn new(api: Arc<dyn AuthApi>, holder: TokenHolder, retry_interval: Duration) -> Self {
        let refresher = TokenRefresher::new(Arc::clone(&api), holder.clone(), retry_interval);
        Self {
            api,
            holder,
            refresher,
        }
    }

    /// Create an account and start the session.
    ///
    /// # Errors
    /// - `AlreadyExists` if the login is taken
    /// - `InvalidArgument` if login or password is empty
    pub async fn register(&self, credentials: Credentials) -> Result<TokenData> {
        let token = self.api.register(&credentials).await?;
        info!(login = %credentials.login, "Registered");
        self.accept(credentials, token).await
    }

    /// Log in and start the session.
    ///
    /// # Errors
    /// - `NotFound` if the login is unknown or the password is wrong
    /// - `InvalidArgument` if login or password is empty
    pub async fn login(&self, credentials: Credentials) -> Result<TokenData> {
        let token = self.api.login(&credentials).await?;
        info!(login = %credentials.login, "Logged in");
        self.accept(credentials, token).await
    }

    async fn accept(&self, credentials: Credentials, token: TokenData) -> Result<TokenData> {
        self.holder.set(token.clone()).await;
        self.refresher.start(credentials, token.expires_at).await;
        Ok(token)
    }

    pub fn holder(&self) -> &TokenHolder {
        &self.holder
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_started()
    }

    /// Stop token renewal.
    pub async fn shutdown(&self) {
        self.refresher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use chrono::Utc;
    use lockbox_rpc::{Code, Status};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingApi {
        logins: AtomicUsize,
    }

    #[async_trait]
    impl AuthApi for CountingApi {
        async fn register(&self, credentials: &Credentials) -> Result<TokenData> {
            if credentials.login == "taken" {
                return Err(ClientError::Status(Status::already_exists("login taken")));
            }
            self.login(credentials).await
        }

        async fn login(&self, _credentials: &Credentials) -> Result<TokenData> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(TokenData {
                token: format!("t{}", n),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
        }
    }

    fn session() -> (Arc<CountingApi>, AuthSession) {
        let api = Arc::new(CountingApi {
            logins: AtomicUsize::new(0),
        });
        let session = AuthSession::new(api.clone(), TokenHolder::new(), Duration::from_secs(5));
        (api, session)
    }

    #[tokio::test]
    async fn test_login_stores_token_and_starts_refresher() {
        let (_api, session) = session();
        assert!(!session.is_refreshing());

        let token = session.login(Credentials::new("alice", "pw")).await.unwrap();
        assert_eq!(session.holder().token().await, Some(token.token));
        assert!(session.is_refreshing());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_register_leaves_session_empty() {
        let (_api, session) = session();
        let err = session
            .register(Credentials::new("taken", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(Code::AlreadyExists));
        assert!(session.holder().get().await.is_none());
        assert!(!session.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_logins_keep_latest_token() {
        let (api, session) = session();
        let (a, b) = tokio::join!(
            session.login(Credentials::new("alice", "pw")),
            session.login(Credentials::new("alice", "pw"))
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(api.logins.load(Ordering::SeqCst), 2);
        assert!(session.holder().token().await.is_some());
        session.shutdown().await;
    }
}
