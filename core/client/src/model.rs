//! Payload shapes the client stores inside resources.
//!
//! The server treats payloads as opaque bytes. These types give them a
//! structure on the client side only.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClientError, Result};
use lockbox_common::ResourceKind;

/// A stored login and password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "login: {}\npassword: {}", self.login, self.password)
    }
}

/// A stored payment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub number: String,
    /// Expiry as printed on the card, e.g. `12/29`.
    pub until: String,
    pub name: String,
    pub surname: String,
}

impl fmt::Display for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "number: {}\nuntil: {}\nholder: {} {}",
            self.number, self.until, self.name, self.surname
        )
    }
}

/// A fetched payload, decoded according to its resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Credential(CredentialPair),
    Card(CardRecord),
    /// Files carry their bytes over the file stream, never here.
    File,
}

impl Payload {
    /// Decode `data` as the payload of a resource of `kind`.
    ///
    /// # Errors
    /// - `ClientError::Decode` if the bytes do not match the kind
    pub fn decode(kind: ResourceKind, data: &[u8]) -> Result<Self> {
        Ok(match kind {
            ResourceKind::CredentialPair => Payload::Credential(serde_json::from_slice(data)?),
            ResourceKind::CardRecord => Payload::Card(serde_json::from_slice(data)?),
            ResourceKind::File => Payload::File,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Payload::Credential(_) => ResourceKind::CredentialPair,
            Payload::Card(_) => ResourceKind::CardRecord,
            Payload::File => ResourceKind::File,
        }
    }

    /// Encode for storage. Files cannot be encoded this way.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Credential(pair) => Ok(serde_json::to_vec(pair)?),
            Payload::Card(card) => Ok(serde_json::to_vec(card)?),
            Payload::File => Err(ClientError::InvalidInput(
                "files are uploaded as a stream".to_string(),
            )),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Credential(pair) => pair.fmt(f),
            Payload::Card(card) => card.fmt(f),
            Payload::File => f.write_str("(file; use get-file to download)"),
        }
    }
}

/// A resource as returned by `GetResource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub payload: Payload,
    pub meta: Vec<u8>,
}

impl Fetched {
    /// Metadata as text, lossily.
    pub fn meta_text(&self) -> String {
        String::from_utf8_lossy(&self.meta).into_owned()
    }
}
