//! HTTP transport.
//!
//! One POST per call. Metadata goes out as request headers; failures come
//! back as an HTTP status with a JSON [`Status`] body.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};
use lockbox_common::Metadata;
use lockbox_rpc::{encode_one, Code, Frame, FrameCodec, Method, Status};

/// Raw call layer shared by the auth and resource clients.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    /// Create a transport for the server at `base`.
    ///
    /// # Errors
    /// - The HTTP client cannot be built
    pub fn new(base: Url) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, base })
    }

    fn request(&self, method: Method, metadata: &Metadata) -> Result<reqwest::RequestBuilder> {
        let url = self
            .base
            .join(method.path())
            .map_err(|e| ClientError::InvalidInput(format!("bad method URL: {}", e)))?;
        let mut builder = self.http.post(url);
        for (key, value) in metadata.iter() {
            builder = builder.header(key, value);
        }
        Ok(builder)
    }

    /// Turn a non-success response into a `Status` error.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let code = response.status();
        if code.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await?;
        let status = serde_json::from_slice::<Status>(&body).unwrap_or_else(|_| {
            Status::new(
                Code::from_http_status(code.as_u16()),
                String::from_utf8_lossy(&body).into_owned(),
            )
        });
        Err(status.into())
    }

    /// One request, one response.
    pub async fn unary<Req, Resp>(
        &self,
        method: Method,
        metadata: &Metadata,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        debug!(method = %method, "Calling");
        let response = self.request(method, metadata)?.json(request).send().await?;
        let response = Self::check(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// One request, streamed response decoded with `codec`.
    pub async fn server_stream<Req, C>(
        &self,
        method: Method,
        metadata: &Metadata,
        request: &Req,
        codec: C,
    ) -> Result<BoxStream<'static, Result<C::Item>>>
    where
        Req: Serialize + ?Sized,
        C: Decoder<Error = io::Error> + Send + 'static,
        C::Item: Send + 'static,
    {
        debug!(method = %method, "Opening response stream");
        let response = self.request(method, metadata)?.json(request).send().await?;
        let response = Self::check(response).await?;

        let reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        Ok(FramedRead::new(reader, codec)
            .map_err(ClientError::from)
            .boxed())
    }

    /// Streamed file frames, one response.
    pub async fn client_stream<S, Resp>(
        &self,
        method: Method,
        metadata: &Metadata,
        frames: S,
    ) -> Result<Resp>
    where
        S: Stream<Item = io::Result<Frame>> + Send + 'static,
        Resp: DeserializeOwned,
    {
        debug!(method = %method, "Opening request stream");
        let mut codec = FrameCodec::new();
        let body = frames.map(move |frame| frame.and_then(|f| encode_one(&mut codec, f)));
        let body: BoxStream<'static, io::Result<Bytes>> = body.boxed();

        let response = self
            .request(method, metadata)?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
