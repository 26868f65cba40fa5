//! Typed client for the resource methods.

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::interceptor::TokenInjector;
use crate::model::{Fetched, Payload};
use crate::transport::HttpTransport;
use lockbox_common::{ResourceId, ResourceKind, ShortResourceInfo, TransferError};
use lockbox_rpc::messages::{
    Empty, GetResourceResponse, ListResourcesRequest, ResourceIdMessage, ResourceInfo,
    SaveResourceRequest,
};
use lockbox_rpc::{Frame, FrameCodec, FrameSequencer, JsonCodec, Method};

/// Upload chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Resource calls on behalf of the session's identity.
#[derive(Clone)]
pub struct ResourceClient {
    transport: HttpTransport,
    injector: TokenInjector,
    chunk_size: usize,
}

impl ResourceClient {
    pub fn new(transport: HttpTransport, injector: TokenInjector) -> Self {
        Self {
            transport,
            injector,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Store raw bytes under `kind`.
    pub async fn save(&self, kind: ResourceKind, data: Vec<u8>, meta: Vec<u8>) -> Result<ResourceId> {
        let metadata = self.injector.metadata(Method::SaveResource).await?;
        let request = SaveResourceRequest { kind, data, meta };
        let response: ResourceIdMessage = self
            .transport
            .unary(Method::SaveResource, &metadata, &request)
            .await?;
        debug!(id = %response.id, kind = %kind, "Saved resource");
        Ok(response.id)
    }

    /// Store a structured payload.
    pub async fn save_payload(&self, payload: &Payload, meta: Vec<u8>) -> Result<ResourceId> {
        self.save(payload.kind(), payload.encode()?, meta).await
    }

    /// Fetch one resource and decode its payload.
    pub async fn get(&self, id: ResourceId) -> Result<Fetched> {
        let metadata = self.injector.metadata(Method::GetResource).await?;
        let response: GetResourceResponse = self
            .transport
            .unary(Method::GetResource, &metadata, &ResourceIdMessage { id })
            .await?;
        Ok(Fetched {
            payload: Payload::decode(response.kind, &response.data)?,
            meta: response.meta,
        })
    }

    /// Stream the caller's resources of `kind`.
    pub async fn list_stream(
        &self,
        kind: ResourceKind,
    ) -> Result<BoxStream<'static, Result<ShortResourceInfo>>> {
        let metadata = self.injector.metadata(Method::ListResources).await?;
        let items = self
            .transport
            .server_stream(
                Method::ListResources,
                &metadata,
                &ListResourcesRequest { kind },
                JsonCodec::<ResourceInfo>::new(),
            )
            .await?;
        Ok(items.map_ok(ShortResourceInfo::from).boxed())
    }

    /// Collect the caller's resources of `kind`.
    pub async fn list(&self, kind: ResourceKind) -> Result<Vec<ShortResourceInfo>> {
        self.list_stream(kind).await?.try_collect().await
    }

    pub async fn delete(&self, id: ResourceId) -> Result<()> {
        let metadata = self.injector.metadata(Method::DeleteResource).await?;
        let _: Empty = self
            .transport
            .unary(Method::DeleteResource, &metadata, &ResourceIdMessage { id })
            .await?;
        debug!(id = %id, "Deleted resource");
        Ok(())
    }

    /// Upload everything `reader` yields as one file resource.
    pub async fn upload<R>(&self, meta: Vec<u8>, reader: R) -> Result<ResourceId>
    where
        R: AsyncRead + Send + 'static,
    {
        let metadata = self.injector.metadata(Method::SaveFile).await?;
        let header = stream::once(async move { Ok::<_, io::Error>(Frame::Header(Bytes::from(meta))) });
        let data = ReaderStream::with_capacity(reader, self.chunk_size).map_ok(Frame::Data);

        let response: ResourceIdMessage = self
            .transport
            .client_stream(Method::SaveFile, &metadata, header.chain(data))
            .await?;
        Ok(response.id)
    }

    /// Upload a local file. Its file name becomes the metadata.
    pub async fn save_file_from(&self, path: &Path) -> Result<ResourceId> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::InvalidInput(format!("not a file: {}", path.display())))?;
        let file = tokio::fs::File::open(path).await?;
        let id = self.upload(name.into_bytes(), file).await?;
        info!(id = %id, path = %path.display(), "Uploaded file");
        Ok(id)
    }

    /// Open a download: the metadata, then the file bytes chunk by chunk.
    ///
    /// # Errors
    /// - `TransferError::MissingHeader` if the stream ends before the header
    /// - `TransferError::DataBeforeHeader` / `DuplicateHeader` on bad ordering
    pub async fn open_file(
        &self,
        id: ResourceId,
    ) -> Result<(Vec<u8>, BoxStream<'static, Result<Bytes>>)> {
        let metadata = self.injector.metadata(Method::GetFile).await?;
        let mut frames = self
            .transport
            .server_stream(
                Method::GetFile,
                &metadata,
                &ResourceIdMessage { id },
                FrameCodec::new(),
            )
            .await?;

        let mut sequencer = FrameSequencer::new();
        let meta = read_header(&mut frames, &mut sequencer).await?;

        let data = frames.map(move |frame| {
            let frame = frame?;
            sequencer.accept(&frame)?;
            match frame {
                Frame::Data(bytes) => Ok(bytes),
                Frame::Header(_) => Err(TransferError::DuplicateHeader.into()),
            }
        });
        Ok((meta.to_vec(), data.boxed()))
    }

    /// Download a file into `dir`, named after its metadata.
    ///
    /// Returns the written path. A failed download removes the partial file.
    pub async fn get_file_to(&self, id: ResourceId, dir: &Path) -> Result<PathBuf> {
        let (meta, mut data) = self.open_file(id).await?;
        let name = file_name_from_meta(&meta).unwrap_or_else(|| id.to_string());
        let path = dir.join(name);

        let mut file = tokio::fs::File::create(&path).await?;
        let written = async {
            let mut total = 0u64;
            while let Some(chunk) = data.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                total += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<_, ClientError>(total)
        }
        .await;

        match written {
            Ok(total) => {
                info!(id = %id, path = %path.display(), bytes = total, "Downloaded file");
                Ok(path)
            }
            Err(e) => {
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %remove, "Failed to remove partial download");
                }
                Err(e)
            }
        }
    }
}

/// Consume the leading header frame of a download.
async fn read_header<S>(frames: &mut S, sequencer: &mut FrameSequencer) -> Result<Bytes>
where
    S: Stream<Item = Result<Frame>> + Unpin,
{
    let first = frames.next().await.transpose()?;
    if let Some(frame) = &first {
        sequencer.accept(frame)?;
    }
    sequencer.finish_download()?;
    match first {
        Some(Frame::Header(meta)) => Ok(meta),
        _ => Err(TransferError::DataBeforeHeader.into()),
    }
}

/// A safe local file name from upload metadata, if it holds one.
fn file_name_from_meta(meta: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(meta).ok()?;
    let name = Path::new(text).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return None;
    }
    Some(name.to_string())
}
