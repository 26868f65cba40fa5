//! Shared holder for the current bearer token.

use std::sync::Arc;
use tokio::sync::RwLock;

use lockbox_common::TokenData;

/// The token shared between outgoing calls (readers) and the refresher
/// (writer). Readers always see a whole token, never a partial update.
#[derive(Clone, Default)]
pub struct TokenHolder {
    inner: Arc<RwLock<Option<TokenData>>>,
}

impl TokenHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token and expiry, if any.
    pub async fn get(&self) -> Option<TokenData> {
        self.inner.read().await.clone()
    }

    /// Current bearer token string, if any.
    pub async fn token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|t| t.token.clone())
    }

    /// Replace the held token.
    pub async fn set(&self, token: TokenData) {
        *self.inner.write().await = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_set_replaces() {
        let holder = TokenHolder::new();
        assert!(holder.get().await.is_none());

        let reader = holder.clone();
        holder
            .set(TokenData {
                token: "one".to_string(),
                expires_at: Utc::now(),
            })
            .await;
        holder
            .set(TokenData {
                token: "two".to_string(),
                expires_at: Utc::now(),
            })
            .await;
        assert_eq!(reader.token().await.as_deref(), Some("two"));
    }
}
