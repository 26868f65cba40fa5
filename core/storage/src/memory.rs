//! In-memory blob store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::blob::{blob_not_found, BlobLocator, BlobReader, BlobStore, BlobWriter};
use lockbox_common::Result;

type Blobs = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-memory blob store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Blobs,
}

impl MemoryBlobStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

struct MemoryBlobWriter {
    blobs: Blobs,
    key: String,
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn append(&mut self, data: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        blobs.entry(self.key.clone()).or_default().extend_from_slice(data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(&self.key).map(|b| b.len() as u64).unwrap_or(0))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, locator: &BlobLocator) -> Result<Box<dyn BlobWriter>> {
        let key = locator.as_str().to_string();
        self.blobs.write().await.insert(key.clone(), Vec::new());
        Ok(Box::new(MemoryBlobWriter {
            blobs: Arc::clone(&self.blobs),
            key,
        }))
    }

    async fn open(&self, locator: &BlobLocator) -> Result<BlobReader> {
        let blobs = self.blobs.read().await;
        let data = blobs
            .get(locator.as_str())
            .cloned()
            .ok_or_else(|| blob_not_found(locator))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(locator.as_str())
            .map(|_| ())
            .ok_or_else(|| blob_not_found(locator))
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(locator.as_str()))
    }
}
