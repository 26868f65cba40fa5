//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `sub` (the identity) and `exp` (unix
//! seconds). Verification needs no server-side state, so a caller may hold
//! any number of valid tokens at once.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::keys::SigningKey;
use lockbox_common::{Identity, Metadata, TokenData, TokenError};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
}

/// Creates and verifies signed bearer tokens with one server-held key.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a token service from the server signing key.
    pub fn new(key: &SigningKey) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `subject` that stops being accepted at `expiry`.
    ///
    /// Sub-second precision of `expiry` is dropped.
    ///
    /// # Errors
    /// - `TokenError::Signing` if `expiry` precedes the unix epoch or encoding fails
    pub fn generate(&self, subject: Identity, expiry: DateTime<Utc>) -> Result<String, TokenError> {
        let exp = u64::try_from(expiry.timestamp())
            .map_err(|_| TokenError::Signing("expiry precedes the unix epoch".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            exp,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issue a token valid for `ttl` from now.
    ///
    /// # Postconditions
    /// - `expires_at` is truncated to whole seconds and equals the `exp` claim
    pub fn issue(&self, subject: Identity, ttl: Duration) -> Result<TokenData, TokenError> {
        let expiry = Utc::now() + ttl;
        let expires_at = Utc
            .timestamp_opt(expiry.timestamp(), 0)
            .single()
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;
        let token = self.generate(subject, expires_at)?;
        Ok(TokenData { token, expires_at })
    }

    /// Decode a token and check signature and expiry in one pass.
    ///
    /// # Errors
    /// - `TokenError::Expired` if `exp` has passed
    /// - `TokenError::BadSignature` if the token was signed with another key
    /// - `TokenError::Malformed` for anything else, including a `sub` that is not an identity
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let decoded = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        Uuid::parse_str(&decoded.claims.sub)
            .map(Identity::from_uuid)
            .map_err(|e| TokenError::Malformed(format!("subject: {}", e)))
    }

    /// Resolve the caller identity from the `token` metadata field.
    ///
    /// # Errors
    /// - `TokenError::Missing` if the field is absent
    /// - `TokenError::Invalid` wrapping the verification failure otherwise
    pub fn resolve_from_metadata(&self, metadata: &Metadata) -> Result<Identity, TokenError> {
        let token = metadata.token().ok_or(TokenError::Missing)?;
        self.verify(token).map_err(|cause| {
            debug!(cause = %cause, "Token rejected");
            TokenError::Invalid(Box::new(cause))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_common::TOKEN_KEY;

    fn service(secret: &[u8]) -> TokenService {
        TokenService::new(&SigningKey::from_bytes(secret.to_vec()).unwrap())
    }

    #[test]
    fn test_generate_then_verify() {
        let tokens = service(b"secret");
        let id = Identity::generate();
        let token = tokens.generate(id, Utc::now() + Duration::hours(1)).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_issue_truncates_expiry() {
        let tokens = service(b"secret");
        let data = tokens.issue(Identity::generate(), Duration::minutes(5)).unwrap();
        assert_eq!(data.expires_at.timestamp_subsec_nanos(), 0);
        assert!(data.expires_at > Utc::now());
    }

    #[test]
    fn test_expired_token() {
        let tokens = service(b"secret");
        let token = tokens
            .generate(Identity::generate(), Utc::now() - Duration::seconds(30))
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_bad_signature() {
        let token = service(b"one")
            .generate(Identity::generate(), Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(service(b"two").verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            service(b"secret").verify("not.a.jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_uuid_subject() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as u64,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(
            service(b"secret").verify(&token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_resolve_missing() {
        let md = Metadata::new();
        assert_eq!(
            service(b"secret").resolve_from_metadata(&md),
            Err(TokenError::Missing)
        );
    }

    #[test]
    fn test_resolve_wraps_cause() {
        let md = Metadata::new().with(TOKEN_KEY, "garbage");
        match service(b"secret").resolve_from_metadata(&md) {
            Err(TokenError::Invalid(cause)) => {
                assert!(matches!(*cause, TokenError::Malformed(_)))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_valid() {
        let tokens = service(b"secret");
        let id = Identity::generate();
        let token = tokens.issue(id, Duration::hours(1)).unwrap().token;
        let md = Metadata::new().with(TOKEN_KEY, token);
        assert_eq!(tokens.resolve_from_metadata(&md).unwrap(), id);
    }
}
