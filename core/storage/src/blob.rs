//! Byte-stream store abstraction.
//!
//! A blob store holds the raw bytes of file resources. The relational record
//! only keeps a [`BlobLocator`]; the store resolves it against its own root.

use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncRead;

use lockbox_common::{Error, ResourceId, Result};

/// Reader over a stored blob.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Server-local address of a blob: exactly one path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocator(String);

impl BlobLocator {
    /// Parse a locator read back from a resource payload.
    ///
    /// # Errors
    /// - Empty, `.`/`..`, or containing a path separator or NUL
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s != "."
            && s != ".."
            && !s.contains(['/', '\\', '\0']);
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid blob locator: {:?}", s)));
        }
        Ok(Self(s))
    }

    /// Locator for the blob backing a file resource.
    pub fn for_resource(id: &ResourceId) -> Self {
        Self(id.to_string())
    }

    /// Decode a locator stored as resource payload bytes.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(payload)
            .map_err(|e| Error::InvalidInput(format!("Blob locator is not UTF-8: {}", e)))?;
        Self::parse(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes to persist as resource payload.
    pub fn to_payload(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequential writer for a blob being created.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append bytes at the end of the blob.
    async fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Flush everything and close the blob. Returns the total size.
    async fn finish(self: Box<Self>) -> Result<u64>;
}

/// Blob store trait for different backends.
///
/// Missing blobs are reported as an I/O error of kind `NotFound`, so
/// callers can test with [`Error::is_not_found`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name (e.g. "local", "memory").
    fn name(&self) -> &str;

    /// Create an empty blob and return a writer for it.
    ///
    /// # Postconditions
    /// - Any existing blob at `locator` is truncated
    async fn create(&self, locator: &BlobLocator) -> Result<Box<dyn BlobWriter>>;

    /// Open a blob for sequential reading.
    ///
    /// # Errors
    /// - Blob not found
    async fn open(&self, locator: &BlobLocator) -> Result<BlobReader>;

    /// Remove a blob.
    ///
    /// # Errors
    /// - Blob not found
    /// - I/O errors
    async fn delete(&self, locator: &BlobLocator) -> Result<()>;

    /// Check if a blob exists.
    async fn exists(&self, locator: &BlobLocator) -> Result<bool>;
}

/// Error returned when a locator does not resolve to a blob.
pub(crate) fn blob_not_found(locator: &BlobLocator) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("Blob not found: {}", locator),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_rejects_traversal() {
        assert!(BlobLocator::parse("..").is_err());
        assert!(BlobLocator::parse("a/b").is_err());
        assert!(BlobLocator::parse("a\\b").is_err());
        assert!(BlobLocator::parse("").is_err());
        assert!(BlobLocator::parse("abc").is_ok());
    }

    #[test]
    fn test_locator_payload() {
        let id = ResourceId::generate();
        let locator = BlobLocator::for_resource(&id);
        let back = BlobLocator::from_payload(&locator.to_payload()).unwrap();
        assert_eq!(back, locator);
        assert_eq!(back.as_str(), id.to_string());
    }
}
