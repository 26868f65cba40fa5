//! Outgoing-call metadata.

use crate::error::{ClientError, Result};
use crate::token::TokenHolder;
use lockbox_common::{Metadata, TOKEN_KEY};
use lockbox_rpc::Method;

/// Attaches the held token to every protected call.
#[derive(Clone)]
pub struct TokenInjector {
    holder: TokenHolder,
}

impl TokenInjector {
    pub fn new(holder: TokenHolder) -> Self {
        Self { holder }
    }

    /// Metadata for a call to `method`.
    ///
    /// Register and Login go out bare. Anything else needs a token.
    ///
    /// # Errors
    /// - `ClientError::NotAuthenticated` if no token is held yet
    pub async fn metadata(&self, method: Method) -> Result<Metadata> {
        if method.is_bypass() {
            return Ok(Metadata::new());
        }
        let token = self
            .holder
            .token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        Ok(Metadata::new().with(TOKEN_KEY, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lockbox_common::TokenData;

    #[tokio::test]
    async fn test_injects_current_token() {
        let holder = TokenHolder::new();
        let injector = TokenInjector::new(holder.clone());

        let err = injector.metadata(Method::GetResource).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));

        holder
            .set(TokenData {
                token: "abc".to_string(),
                expires_at: Utc::now(),
            })
            .await;
        let md = injector.metadata(Method::GetResource).await.unwrap();
        assert_eq!(md.token(), Some("abc"));

        let md = injector.metadata(Method::Login).await.unwrap();
        assert!(md.is_empty());
    }
}
