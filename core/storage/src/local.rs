//! Local filesystem blob store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::blob::{blob_not_found, BlobLocator, BlobReader, BlobStore, BlobWriter};
use lockbox_common::Result;

/// Local filesystem blob store.
///
/// Each blob is one flat file under the root directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Sync on purpose: called once at startup.
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_fs_path(&self, locator: &BlobLocator) -> PathBuf {
        self.root.join(locator.as_str())
    }
}

struct LocalBlobWriter {
    file: BufWriter<File>,
    written: u64,
}

#[async_trait]
impl BlobWriter for LocalBlobWriter {
    async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<u64> {
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        Ok(self.written)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn create(&self, locator: &BlobLocator) -> Result<Box<dyn BlobWriter>> {
        let fs_path = self.to_fs_path(locator);
        debug!(locator = %locator, "Creating blob");
        let file = File::create(&fs_path).await?;
        Ok(Box::new(LocalBlobWriter {
            file: BufWriter::new(file),
            written: 0,
        }))
    }

    async fn open(&self, locator: &BlobLocator) -> Result<BlobReader> {
        let fs_path = self.to_fs_path(locator);
        match File::open(&fs_path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(blob_not_found(locator)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<()> {
        let fs_path = self.to_fs_path(locator);
        debug!(locator = %locator, "Deleting blob");
        match fs::remove_file(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(blob_not_found(locator)),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool> {
        Ok(fs::try_exists(self.to_fs_path(locator)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path()).unwrap();
        let locator = BlobLocator::parse("blob1").unwrap();

        let mut writer = store.create(&locator).await.unwrap();
        writer.append(b"hello, ").await.unwrap();
        writer.append(b"world").await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 12);

        let mut reader = store.open(&locator).await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"hello, world");
    }

    #[tokio::test]
    async fn test_local_delete() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path()).unwrap();
        let locator = BlobLocator::parse("blob1").unwrap();

        store.create(&locator).await.unwrap().finish().await.unwrap();
        assert!(store.exists(&locator).await.unwrap());

        store.delete(&locator).await.unwrap();
        assert!(!store.exists(&locator).await.unwrap());

        let err = store.delete(&locator).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_open_missing() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path()).unwrap();
        let locator = BlobLocator::parse("missing").unwrap();
        assert!(store.open(&locator).await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_local_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("files");
        let store = LocalBlobStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }
}
