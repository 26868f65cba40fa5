//! Common types used throughout Lockbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Opaque subject identifier; created at registration and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid identity '{}': {}", s, e)))
    }
}

/// System-generated resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Generate a fresh resource id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid resource id '{}': {}", s, e)))
    }
}

/// Kind of a stored resource.
///
/// Type-agnostic lookups use [`KindFilter::Any`]; a wildcard is never a
/// storable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Login and password pair.
    CredentialPair,
    /// Opaque file; the payload is a storage locator.
    File,
    /// Payment card record.
    CardRecord,
}

impl ResourceKind {
    /// Every storable kind.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::CredentialPair,
        ResourceKind::File,
        ResourceKind::CardRecord,
    ];

    /// Stable integer code used on disk.
    pub fn code(self) -> i64 {
        match self {
            ResourceKind::CredentialPair => 1,
            ResourceKind::File => 2,
            ResourceKind::CardRecord => 3,
        }
    }

    /// Decode an on-disk code. Code 0 is the wildcard and is never valid here.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(ResourceKind::CredentialPair),
            2 => Ok(ResourceKind::File),
            3 => Ok(ResourceKind::CardRecord),
            other => Err(Error::InvalidInput(format!(
                "Unknown resource kind code: {}",
                other
            ))),
        }
    }

    /// Short name used in logs and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::CredentialPair => "credential_pair",
            ResourceKind::File => "file",
            ResourceKind::CardRecord => "card_record",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown resource kind: {}", s)))
    }
}

/// Kind filter for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    /// Match any kind.
    Any,
    /// Match exactly this kind.
    Only(ResourceKind),
}

impl KindFilter {
    /// Check whether a stored kind passes the filter.
    pub fn matches(self, kind: ResourceKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Only(expected) => expected == kind,
        }
    }
}

impl From<ResourceKind> for KindFilter {
    fn from(kind: ResourceKind) -> Self {
        KindFilter::Only(kind)
    }
}

/// One stored item, scoped to exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub owner: Identity,
    pub kind: ResourceKind,
    pub payload: Vec<u8>,
    pub meta: Vec<u8>,
}

/// Listing projection; never exposes the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortResourceInfo {
    pub id: ResourceId,
    pub meta: Vec<u8>,
}

/// A bearer token and the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenData")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Login and password pair used to register or log in.
///
/// The password is zeroized on drop and redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    /// Create a credentials pair.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Check the format rules: both fields must be non-empty.
    ///
    /// # Errors
    /// - `AuthError::InvalidFormat` if login or password is empty
    pub fn validate(&self) -> Result<()> {
        if self.login.is_empty() || self.password.is_empty() {
            return Err(crate::AuthError::InvalidFormat("must be nonempty".to_string()).into());
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
