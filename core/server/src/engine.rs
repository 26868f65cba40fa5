//! Resource access engine.
//!
//! Owner-scoped CRUD over resources. File resources span two stores: the
//! record lives in the database and its bytes in a [`BlobStore`] under a
//! locator kept in the record payload.

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use lockbox_common::{
    Error, Identity, KindFilter, Resource, ResourceError, ResourceId, ResourceKind, Result,
    ShortResourceInfo, TransferError,
};
use lockbox_rpc::{Frame, FrameSequencer};
use lockbox_storage::{resources, BlobLocator, BlobStore, BlobWriter, Database};

/// Default largest data frame emitted by [`ResourceEngine::get_file`].
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Rows fetched per round trip while listing.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Lazy sequence of listing entries.
pub type ResourceInfoStream = BoxStream<'static, Result<ShortResourceInfo>>;

/// Lazy sequence of file transfer frames.
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// Resource CRUD scoped to one owner per call.
#[derive(Clone)]
pub struct ResourceEngine {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    chunk_size: usize,
    page_size: usize,
}

impl ResourceEngine {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            db,
            blobs,
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Largest data frame emitted by [`get_file`](Self::get_file). Zero is ignored.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Rows per listing page. Zero is ignored.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Persist a non-file resource under a fresh id.
    ///
    /// # Errors
    /// - `InvalidInput` for `ResourceKind::File`; file records only come from [`save_file`](Self::save_file)
    /// - `AuthError::NotFound` if the owner does not exist
    pub async fn save(
        &self,
        owner: Identity,
        kind: ResourceKind,
        payload: Vec<u8>,
        meta: Vec<u8>,
    ) -> Result<ResourceId> {
        if kind == ResourceKind::File {
            return Err(Error::InvalidInput(
                "file resources must be uploaded with SaveFile".to_string(),
            ));
        }

        let resource = Resource {
            id: ResourceId::generate(),
            owner,
            kind,
            payload,
            meta,
        };
        self.db.insert_resource(&resource).await?;
        Ok(resource.id)
    }

    /// Fetch a resource of `owner`.
    ///
    /// # Errors
    /// - `ResourceError` (reads as not found) if absent, foreign, or of another kind
    pub async fn get(&self, id: ResourceId, owner: Identity, filter: KindFilter) -> Result<Resource> {
        self.db.get_resource(&id, &owner, filter).await
    }

    /// Lazily list `owner`'s resources of `kind` in storage order.
    ///
    /// Pages are fetched on demand; the sequence is finite and cannot be
    /// restarted.
    pub fn list_by_owner(&self, owner: Identity, kind: ResourceKind) -> ResourceInfoStream {
        let db = self.db.clone();
        let page_size = self.page_size;

        // State: None once exhausted, Some(cursor) otherwise.
        let pages = stream::try_unfold(Some(None), move |cursor: Option<Option<i64>>| {
            let db = db.clone();
            async move {
                let Some(after) = cursor else {
                    return Ok(None);
                };
                let page = db.list_page(&owner, kind, after, page_size).await?;
                let next = page.next.map(Some);
                Ok::<_, Error>(Some((stream::iter(page.items.into_iter().map(Ok)), next)))
            }
        });

        pages.try_flatten().boxed()
    }

    /// Delete a resource of `owner`.
    ///
    /// For a file the blob goes first and the record second, inside one
    /// transaction. If the blob cannot be removed the transaction rolls back
    /// and the record stays.
    ///
    /// # Errors
    /// - `ResourceError` if absent or foreign
    /// - Blob store or database failure
    pub async fn delete(&self, id: ResourceId, owner: Identity) -> Result<()> {
        let resource = self.db.get_resource(&id, &owner, KindFilter::Any).await?;

        if resource.kind != ResourceKind::File {
            if !self.db.delete_resource(&id, &owner).await? {
                return Err(ResourceError::NotFound.into());
            }
            debug!(resource = %id, kind = %resource.kind, "Resource deleted");
            return Ok(());
        }

        let locator = BlobLocator::from_payload(&resource.payload)?;
        let tx = self.db.begin().await?;

        // A concurrent delete may have won between the fetch and the lock.
        resources::get_resource(&tx, &id, &owner, ResourceKind::File.into())?;

        match self.blobs.delete(&locator).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(resource = %id, locator = %locator, "Blob already gone; removing record");
            }
            Err(e) => {
                error!(resource = %id, error = %e, "Blob delete failed; keeping record");
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        }

        if !resources::delete_resource(&tx, &id, &owner)? {
            return Err(ResourceError::NotFound.into());
        }
        tx.commit()?;

        info!(resource = %id, "File deleted");
        Ok(())
    }

    /// Store an uploaded file.
    ///
    /// The first frame must be the header; it creates the record under a
    /// fresh id and locator. Every later data frame is appended in order.
    /// If the upload fails after that, the partial blob and the record are
    /// removed again.
    ///
    /// # Errors
    /// - `TransferError::EmptyUpload` if the stream ends before any frame
    /// - `TransferError::DataBeforeHeader` / `DuplicateHeader` on bad ordering
    /// - `AuthError::NotFound` if the owner does not exist
    /// - `ResourceError::NotFound` if the record was deleted before the upload finished
    pub async fn save_file<S>(&self, owner: Identity, mut frames: S) -> Result<ResourceId>
    where
        S: Stream<Item = Result<Frame>> + Unpin + Send,
    {
        let mut sequencer = FrameSequencer::new();
        let first = frames.next().await.ok_or(TransferError::EmptyUpload)??;
        sequencer.accept(&first)?;
        let Frame::Header(meta) = first else {
            return Err(TransferError::DataBeforeHeader.into());
        };

        let id = ResourceId::generate();
        let locator = BlobLocator::for_resource(&id);
        let resource = Resource {
            id,
            owner,
            kind: ResourceKind::File,
            payload: locator.to_payload(),
            meta: meta.to_vec(),
        };
        self.db.insert_resource(&resource).await?;

        let writer = match self.blobs.create(&locator).await {
            Ok(writer) => writer,
            Err(e) => {
                self.discard_upload(&id, &owner, &locator).await;
                return Err(e);
            }
        };

        let size = match write_frames(&mut sequencer, &mut frames, writer).await {
            Ok(size) => size,
            Err(e) => {
                warn!(resource = %id, error = %e, "Upload failed; discarding");
                self.discard_upload(&id, &owner, &locator).await;
                return Err(e);
            }
        };

        // A delete may have removed the record while the bytes were streaming.
        if let Err(e) = self
            .db
            .get_resource(&id, &owner, ResourceKind::File.into())
            .await
        {
            warn!(resource = %id, error = %e, "Record gone after upload; discarding bytes");
            self.discard_upload(&id, &owner, &locator).await;
            return Err(e);
        }

        info!(resource = %id, size, "File stored");
        Ok(id)
    }

    /// Stream a stored file: one header frame with the metadata, then data
    /// frames of at most the configured chunk size, read lazily.
    ///
    /// # Errors
    /// - `ResourceError` if absent, foreign, or not a file
    /// - Blob missing from the store
    pub async fn get_file(&self, id: ResourceId, owner: Identity) -> Result<FrameStream> {
        let resource = self
            .db
            .get_resource(&id, &owner, ResourceKind::File.into())
            .await?;
        let locator = BlobLocator::from_payload(&resource.payload)?;
        let reader = self.blobs.open(&locator).await?;

        let header = stream::once(async move { Ok(Frame::Header(Bytes::from(resource.meta))) });
        let data = ReaderStream::with_capacity(reader, self.chunk_size)
            .map_ok(Frame::Data)
            .map_err(|e| Error::from(TransferError::Io(e)));

        Ok(header.chain(data).boxed())
    }

    async fn discard_upload(&self, id: &ResourceId, owner: &Identity, locator: &BlobLocator) {
        match self.blobs.delete(locator).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(resource = %id, error = %e, "Could not remove partial blob"),
        }
        if let Err(e) = self.db.delete_resource(id, owner).await {
            warn!(resource = %id, error = %e, "Could not remove partial record");
        }
    }
}

async fn write_frames<S>(
    sequencer: &mut FrameSequencer,
    frames: &mut S,
    mut writer: Box<dyn BlobWriter>,
) -> Result<u64>
where
    S: Stream<Item = Result<Frame>> + Unpin + Send,
{
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        sequencer.accept(&frame)?;
        if let Frame::Data(chunk) = frame {
            writer.append(&chunk).await?;
        }
    }
    sequencer.finish_upload()?;
    writer.finish().await
}
