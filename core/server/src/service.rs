//! RPC handlers.
//!
//! Handlers receive an already authorized context (or stream) and translate
//! between wire messages and the auth service and engine. Domain errors pass
//! through unchanged and become a [`Status`] at the edge.

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::auth::AuthService;
use crate::context::RequestContext;
use crate::engine::ResourceEngine;
use crate::stream::{InboundStream, OutboundStream};
use lockbox_common::{Credentials, KindFilter, ResourceKind, TokenData};
use lockbox_rpc::messages::{
    Empty, GetResourceResponse, ListResourcesRequest, ResourceIdMessage, ResourceInfo,
    SaveResourceRequest,
};
use lockbox_rpc::{Frame, Status};

/// Every remote method of the vault.
#[derive(Clone)]
pub struct VaultService {
    auth: AuthService,
    engine: ResourceEngine,
}

impl VaultService {
    pub fn new(auth: AuthService, engine: ResourceEngine) -> Self {
        Self { auth, engine }
    }

    pub async fn register(
        &self,
        _ctx: RequestContext,
        credentials: Credentials,
    ) -> Result<TokenData, Status> {
        Ok(self.auth.register(&credentials).await?)
    }

    pub async fn login(
        &self,
        _ctx: RequestContext,
        credentials: Credentials,
    ) -> Result<TokenData, Status> {
        Ok(self.auth.login(&credentials).await?)
    }

    pub async fn save_resource(
        &self,
        ctx: RequestContext,
        request: SaveResourceRequest,
    ) -> Result<ResourceIdMessage, Status> {
        let owner = ctx.identity()?;
        let id = self
            .engine
            .save(owner, request.kind, request.data, request.meta)
            .await?;
        debug!(owner = %owner, resource = %id, kind = %request.kind, "Resource saved");
        Ok(ResourceIdMessage { id })
    }

    pub async fn delete_resource(
        &self,
        ctx: RequestContext,
        request: ResourceIdMessage,
    ) -> Result<Empty, Status> {
        let owner = ctx.identity()?;
        self.engine.delete(request.id, owner).await?;
        Ok(Empty {})
    }

    /// Fetch one resource. File resources come back with empty data; their
    /// content is only available through GetFile.
    pub async fn get_resource(
        &self,
        ctx: RequestContext,
        request: ResourceIdMessage,
    ) -> Result<GetResourceResponse, Status> {
        let owner = ctx.identity()?;
        let resource = self.engine.get(request.id, owner, KindFilter::Any).await?;
        let data = match resource.kind {
            ResourceKind::File => Vec::new(),
            _ => resource.payload,
        };
        Ok(GetResourceResponse {
            kind: resource.kind,
            data,
            meta: resource.meta,
        })
    }

    pub async fn list_resources<S>(
        &self,
        stream: &mut S,
        request: ListResourcesRequest,
    ) -> Result<(), Status>
    where
        S: OutboundStream<ResourceInfo>,
    {
        let owner = stream.context().identity()?;
        let mut items = self.engine.list_by_owner(owner, request.kind);
        let mut sent = 0usize;
        while let Some(item) = items.next().await {
            stream.send(ResourceInfo::from(item?)).await?;
            sent += 1;
        }
        debug!(owner = %owner, kind = %request.kind, sent, "Resources listed");
        Ok(())
    }

    pub async fn save_file<S>(&self, stream: S) -> Result<ResourceIdMessage, Status>
    where
        S: InboundStream<Frame>,
    {
        let owner = stream.context().identity()?;
        let frames = stream::unfold(stream, |mut stream| async move {
            stream.recv().await.map(|frame| (frame, stream))
        })
        .boxed();
        let id = self.engine.save_file(owner, frames).await?;
        Ok(ResourceIdMessage { id })
    }

    pub async fn get_file<S>(&self, stream: &mut S, request: ResourceIdMessage) -> Result<(), Status>
    where
        S: OutboundStream<Frame>,
    {
        let owner = stream.context().identity()?;
        let mut frames = self.engine.get_file(request.id, owner).await?;
        while let Some(frame) = frames.next().await {
            stream.send(frame?).await?;
        }
        Ok(())
    }
}
