//! HTTP transport.
//!
//! Maps every [`Method`] onto a POST route. Call metadata is read from the
//! request headers. Streamed responses are fed through a bounded channel so
//! a slow caller holds the producer back one frame at a time.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::{SinkExt, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::{Encoder, FramedRead};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info};

use crate::context::RequestContext;
use crate::interceptor::AuthInterceptor;
use crate::service::VaultService;
use crate::stream::{AuthenticatedStream, InboundStream, OutboundStream, ServerStream};
use lockbox_common::{Error, Metadata, Result, TransferError};
use lockbox_rpc::messages::{ListResourcesRequest, ResourceIdMessage, ResourceInfo};
use lockbox_rpc::{encode_one, Frame, FrameCodec, JsonCodec, Method, Status};

const STREAM_CONTENT_TYPE: &str = "application/octet-stream";

struct AppState {
    interceptor: AuthInterceptor,
    service: Arc<VaultService>,
}

/// Build the router serving every method.
pub fn router(interceptor: AuthInterceptor, service: VaultService) -> Router {
    let state = Arc::new(AppState {
        interceptor,
        service: Arc::new(service),
    });

    Router::new()
        .route(Method::Register.path(), post(register))
        .route(Method::Login.path(), post(login))
        .route(Method::SaveResource.path(), post(save_resource))
        .route(Method::DeleteResource.path(), post(delete_resource))
        .route(Method::GetResource.path(), post(get_resource))
        .route(Method::ListResources.path(), post(list_resources))
        .route(Method::SaveFile.path(), post(save_file))
        .route(Method::GetFile.path(), post(get_file))
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            metadata.insert(name.as_str(), value);
        }
    }
    metadata
}

fn status_response(status: Status) -> Response {
    let code = StatusCode::from_u16(status.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(status)).into_response()
}

fn parse_request<Req: DeserializeOwned>(body: &[u8]) -> std::result::Result<Req, Status> {
    serde_json::from_slice(body)
        .map_err(|e| Status::invalid_argument(format!("malformed request: {}", e)))
}

async fn unary_call<Req, Resp, F, Fut>(
    state: &AppState,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
    handler: F,
) -> Response
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Arc<VaultService>, RequestContext, Req) -> Fut,
    Fut: Future<Output = std::result::Result<Resp, Status>>,
{
    debug!(method = %method, "Unary call");
    let ctx = RequestContext::new(method, metadata_from_headers(headers));
    let service = Arc::clone(&state.service);
    let result = state
        .interceptor
        .unary(ctx, body, |ctx, body| async move {
            let request = parse_request(&body)?;
            handler(service, ctx, request).await
        })
        .await;

    match result {
        Ok(response) => Json(response).into_response(),
        Err(status) => status_response(status),
    }
}

async fn register(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    unary_call(&state, Method::Register, &headers, body, |svc, ctx, req| async move {
        svc.register(ctx, req).await
    })
    .await
}

async fn login(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    unary_call(&state, Method::Login, &headers, body, |svc, ctx, req| async move {
        svc.login(ctx, req).await
    })
    .await
}

async fn save_resource(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    unary_call(&state, Method::SaveResource, &headers, body, |svc, ctx, req| async move {
        svc.save_resource(ctx, req).await
    })
    .await
}

async fn delete_resource(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    unary_call(&state, Method::DeleteResource, &headers, body, |svc, ctx, req| async move {
        svc.delete_resource(ctx, req).await
    })
    .await
}

async fn get_resource(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    unary_call(&state, Method::GetResource, &headers, body, |svc, ctx, req| async move {
        svc.get_resource(ctx, req).await
    })
    .await
}

/// Outbound stream writing encoded records into the response channel.
struct ChannelOutbound<T, C> {
    context: RequestContext,
    codec: C,
    tx: mpsc::Sender<io::Result<Bytes>>,
    _item: PhantomData<fn(T)>,
}

impl<T, C: Send> ServerStream for ChannelOutbound<T, C> {
    fn context(&self) -> &RequestContext {
        &self.context
    }
}

#[async_trait]
impl<T, C> OutboundStream<T> for ChannelOutbound<T, C>
where
    T: Send + 'static,
    C: Encoder<T, Error = io::Error> + Send,
{
    async fn send(&mut self, item: T) -> Result<()> {
        let record = encode_one(&mut self.codec, item).map_err(TransferError::Io)?;
        self.tx.send(Ok(record)).await.map_err(|_| {
            TransferError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "caller stopped reading",
            ))
        })?;
        Ok(())
    }
}

type Outbound<T, C> = AuthenticatedStream<ChannelOutbound<T, C>>;

/// Run a server-streaming handler on its own task and stream its output.
///
/// A failure before the first record becomes a status response; a failure
/// after it aborts the body.
async fn server_streaming_call<Req, T, C, F, Fut>(
    state: &AppState,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
    codec: C,
    handler: F,
) -> Response
where
    Req: DeserializeOwned + Send + 'static,
    T: Send + 'static,
    C: Encoder<T, Error = io::Error> + Send + 'static,
    F: FnOnce(Arc<VaultService>, Outbound<T, C>, Req) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<(), Status>> + Send + 'static,
{
    debug!(method = %method, "Server-streaming call");
    let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(1);
    let outbound = ChannelOutbound {
        context: RequestContext::new(method, metadata_from_headers(headers)),
        codec,
        tx: tx.clone(),
        _item: PhantomData,
    };
    let interceptor = state.interceptor.clone();
    let service = Arc::clone(&state.service);

    let task = tokio::spawn(async move {
        let mut abort = tx;
        let result = interceptor
            .streaming(outbound, |stream| async move {
                let request = parse_request(&body)?;
                handler(service, stream, request).await
            })
            .await;
        if let Err(status) = &result {
            // Ignored if the caller is gone.
            let _ = abort
                .send(Err(io::Error::other(status.to_string())))
                .await;
        }
        result
    });

    match rx.next().await {
        Some(Ok(first)) => {
            let body = stream::once(async move { Ok::<_, io::Error>(first) }).chain(rx);
            (
                [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
                Body::from_stream(body),
            )
                .into_response()
        }
        Some(Err(_)) | None => match task.await {
            Ok(Ok(())) => ([(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)], Body::empty()).into_response(),
            Ok(Err(status)) => status_response(status),
            Err(e) => {
                error!(method = %method, error = %e, "Stream task failed");
                status_response(Status::internal("internal error"))
            }
        },
    }
}

async fn list_resources(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    server_streaming_call(
        &state,
        Method::ListResources,
        &headers,
        body,
        JsonCodec::<ResourceInfo>::new(),
        |svc,
         mut stream: Outbound<ResourceInfo, JsonCodec<ResourceInfo>>,
         req: ListResourcesRequest| async move { svc.list_resources(&mut stream, req).await },
    )
    .await
}

async fn get_file(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    server_streaming_call(
        &state,
        Method::GetFile,
        &headers,
        body,
        FrameCodec::new(),
        |svc, mut stream: Outbound<Frame, FrameCodec>, req: ResourceIdMessage| async move {
            svc.get_file(&mut stream, req).await
        },
    )
    .await
}

/// Inbound stream decoding frames from the request body.
struct BodyInbound {
    context: RequestContext,
    frames: BoxStream<'static, Result<Frame>>,
}

impl ServerStream for BodyInbound {
    fn context(&self) -> &RequestContext {
        &self.context
    }
}

#[async_trait]
impl InboundStream<Frame> for BodyInbound {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        self.frames.next().await
    }
}

async fn save_file(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Body) -> Response {
    debug!(method = %Method::SaveFile, "Client-streaming call");
    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let frames = FramedRead::new(reader, FrameCodec::new())
        .map_err(|e| Error::from(TransferError::Io(e)))
        .boxed();
    let inbound = BodyInbound {
        context: RequestContext::new(Method::SaveFile, metadata_from_headers(&headers)),
        frames,
    };

    let service = Arc::clone(&state.service);
    let result = state
        .interceptor
        .streaming(inbound, |stream| async move { service.save_file(stream).await })
        .await;

    match result {
        Ok(response) => Json(response).into_response(),
        Err(status) => status_response(status),
    }
}
