//! Identity bootstrap: Register and Login.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use zeroize::Zeroizing;

use lockbox_common::{AuthError, Credentials, Error, Result, TokenData};
use lockbox_crypto::{hash_password, verify_password, HashParams, TokenService};
use lockbox_storage::Database;

/// Creates identities and issues their tokens.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: TokenService,
    ttl: Duration,
    hash_params: HashParams,
    /// Verified against on unknown logins so both failure paths pay one hash.
    dummy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(db: Database, tokens: TokenService, ttl: Duration) -> Self {
        Self {
            db,
            tokens,
            ttl,
            hash_params: HashParams::default(),
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Override the password hashing cost.
    pub fn with_hash_params(mut self, params: HashParams) -> Self {
        self.hash_params = params;
        self.dummy_hash = Arc::new(OnceCell::new());
        self
    }

    /// Create an identity for new credentials and issue its first token.
    ///
    /// # Errors
    /// - `AuthError::InvalidFormat` if login or password is empty (checked before storage)
    /// - `AuthError::AlreadyExists` if the login is taken
    pub async fn register(&self, credentials: &Credentials) -> Result<TokenData> {
        credentials.validate()?;

        let password = Zeroizing::new(credentials.password.clone());
        let params = self.hash_params;
        let password_hash = run_blocking(move || hash_password(&password, &params)).await?;

        let id = self.db.insert_user(&credentials.login, &password_hash).await?;
        info!(user = %id, "User registered");

        Ok(self.tokens.issue(id, self.ttl)?)
    }

    /// Check credentials and issue a fresh token.
    ///
    /// # Errors
    /// - `AuthError::InvalidFormat` if login or password is empty
    /// - `AuthError::NotFound` if the login is unknown or the password is wrong
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenData> {
        credentials.validate()?;

        let user = self.db.find_user_by_login(&credentials.login).await?;
        let password = Zeroizing::new(credentials.password.clone());

        let Some(user) = user else {
            let dummy = self.dummy_hash().await?;
            run_blocking(move || verify_password(&password, &dummy)).await?;
            debug!("Unknown login");
            return Err(AuthError::NotFound.into());
        };

        let stored = user.password_hash.clone();
        if !run_blocking(move || verify_password(&password, &stored)).await? {
            debug!(user = %user.id, "Password mismatch");
            return Err(AuthError::NotFound.into());
        }

        debug!(user = %user.id, "User logged in");
        Ok(self.tokens.issue(user.id, self.ttl)?)
    }

    /// A hash with the service's parameters, computed once.
    async fn dummy_hash(&self) -> Result<String> {
        let params = self.hash_params;
        self.dummy_hash
            .get_or_try_init(|| run_blocking(move || hash_password("lockbox-unknown-login", &params)))
            .await
            .cloned()
    }
}

/// Run CPU-heavy hashing off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Crypto(format!("Hashing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_crypto::SigningKey;

    fn service() -> (AuthService, TokenService) {
        let tokens = TokenService::new(&SigningKey::from_bytes(b"k".to_vec()).unwrap());
        let svc = AuthService::new(Database::in_memory().unwrap(), tokens.clone(), Duration::hours(1))
            .with_hash_params(HashParams::minimal());
        (svc, tokens)
    }

    #[tokio::test]
    async fn test_register_then_login_same_identity() {
        let (svc, tokens) = service();
        let creds = Credentials::new("alice", "pw");

        let registered = svc.register(&creds).await.unwrap();
        let logged_in = svc.login(&creds).await.unwrap();

        let id = tokens.verify(&registered.token).unwrap();
        assert_eq!(tokens.verify(&logged_in.token).unwrap(), id);
        assert!(logged_in.expires_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let (svc, _) = service();
        svc.register(&Credentials::new("alice", "pw")).await.unwrap();
        let err = svc.register(&Credentials::new("alice", "other")).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_login_unknown_or_wrong_password() {
        let (svc, _) = service();
        let err = svc.login(&Credentials::new("ghost", "pw")).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NotFound)));
        // The unknown login still went through a password verification.
        let dummy = svc.dummy_hash.get().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(!verify_password("pw", dummy).unwrap());

        svc.register(&Credentials::new("alice", "pw")).await.unwrap();
        let err = svc.login(&Credentials::new("alice", "nope")).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let (svc, _) = service();
        for creds in [Credentials::new("", "pw"), Credentials::new("alice", "")] {
            let err = svc.register(&creds).await.unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::InvalidFormat(_))));
            let err = svc.login(&creds).await.unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::InvalidFormat(_))));
        }
    }
}
