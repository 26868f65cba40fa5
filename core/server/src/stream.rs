//! Server-side call streams.
//!
//! A streamed call hands its handler a stream object instead of a request
//! body. [`AuthenticatedStream`] wraps any such stream so the handler sees
//! the authorized context while every other operation goes to the inner
//! stream unchanged.

use async_trait::async_trait;

use crate::context::RequestContext;
use lockbox_common::Result;

/// Common surface of every server-side stream.
pub trait ServerStream: Send {
    /// Context of the call this stream belongs to.
    fn context(&self) -> &RequestContext;
}

/// Stream of messages sent by the caller.
#[async_trait]
pub trait InboundStream<T: Send + 'static>: ServerStream {
    /// Next message, or `None` at end of stream.
    async fn recv(&mut self) -> Option<Result<T>>;
}

/// Stream of messages sent to the caller.
#[async_trait]
pub trait OutboundStream<T: Send + 'static>: ServerStream {
    /// Send one message, waiting while the caller is not keeping up.
    async fn send(&mut self, item: T) -> Result<()>;
}

/// Decorator exposing a derived context over an existing stream.
pub struct AuthenticatedStream<S> {
    inner: S,
    context: RequestContext,
}

impl<S: ServerStream> AuthenticatedStream<S> {
    pub fn new(inner: S, context: RequestContext) -> Self {
        Self { inner, context }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ServerStream> ServerStream for AuthenticatedStream<S> {
    fn context(&self) -> &RequestContext {
        &self.context
    }
}

#[async_trait]
impl<T, S> InboundStream<T> for AuthenticatedStream<S>
where
    T: Send + 'static,
    S: InboundStream<T>,
{
    async fn recv(&mut self) -> Option<Result<T>> {
        self.inner.recv().await
    }
}

#[async_trait]
impl<T, S> OutboundStream<T> for AuthenticatedStream<S>
where
    T: Send + 'static,
    S: OutboundStream<T>,
{
    async fn send(&mut self, item: T) -> Result<()> {
        self.inner.send(item).await
    }
}
