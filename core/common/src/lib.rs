//! Common types shared across Lockbox crates.
//!
//! Identities, resource kinds, per-call metadata and the error taxonomy live
//! here so every layer speaks the same vocabulary.

pub mod error;
pub mod metadata;
pub mod types;

pub use error::{AuthError, Error, ResourceError, Result, StorageError, TokenError, TransferError};
pub use metadata::{Metadata, TOKEN_KEY};
pub use types::{
    Credentials, Identity, KindFilter, Resource, ResourceId, ResourceKind, ShortResourceInfo,
    TokenData,
};
