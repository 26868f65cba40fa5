//! Signing key with secure memory handling.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use lockbox_common::{Error, Result};

/// Symmetric key used to sign and verify bearer tokens.
///
/// Never logged, serialized or returned to a caller.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    key: Vec<u8>,
}

impl SigningKey {
    /// Create a signing key from raw bytes.
    ///
    /// # Errors
    /// - Returns error if `key` is empty
    pub fn from_bytes(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidInput("Signing key cannot be empty".to_string()));
        }
        Ok(Self { key })
    }

    /// Generate a random 256-bit key.
    ///
    /// # Errors
    /// - Returns error if the OS random source is unavailable
    pub fn generate() -> Result<Self> {
        let mut key = vec![0u8; 32];
        getrandom::getrandom(&mut key)
            .map_err(|e| Error::InvalidInput(format!("Random source failed: {}", e)))?;
        Ok(Self { key })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}
