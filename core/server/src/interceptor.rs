//! Authorization interceptor.
//!
//! Every call except Register and Login must carry a valid token in its
//! `token` metadata field. The interceptor verifies it before the handler
//! runs and hands the handler a derived context carrying the identity.

use std::future::Future;
use tracing::debug;

use crate::context::RequestContext;
use crate::stream::{AuthenticatedStream, ServerStream};
use lockbox_crypto::TokenService;
use lockbox_rpc::Status;

/// Gate in front of every handler.
#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: TokenService,
}

impl AuthInterceptor {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }

    /// Authorize a call and derive the context its handler runs with.
    ///
    /// # Postconditions
    /// - Bypass methods get the context back unchanged
    /// - Otherwise the returned context carries the verified identity
    ///
    /// # Errors
    /// - `Unauthenticated` if the token is missing or invalid
    pub fn authorize(&self, ctx: &RequestContext) -> Result<RequestContext, Status> {
        if ctx.method().is_bypass() {
            return Ok(ctx.clone());
        }

        match self.tokens.resolve_from_metadata(ctx.metadata()) {
            Ok(identity) => Ok(ctx.with_identity(identity)),
            Err(e) => {
                debug!(method = %ctx.method(), error = %e, "Call rejected");
                Err(Status::unauthenticated(e.to_string()))
            }
        }
    }

    /// Run a unary handler behind the gate.
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        ctx: RequestContext,
        request: Req,
        handler: F,
    ) -> Result<Resp, Status>
    where
        F: FnOnce(RequestContext, Req) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        let ctx = self.authorize(&ctx)?;
        handler(ctx, request).await
    }

    /// Run a streaming handler behind the gate.
    ///
    /// The handler receives the stream wrapped in an [`AuthenticatedStream`].
    pub async fn streaming<S, Resp, F, Fut>(&self, stream: S, handler: F) -> Result<Resp, Status>
    where
        S: ServerStream,
        F: FnOnce(AuthenticatedStream<S>) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        let ctx = self.authorize(stream.context())?;
        handler(AuthenticatedStream::new(stream, ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::testing::VecInbound;
    use crate::stream::InboundStream;
    use chrono::Duration;
    use lockbox_common::{Identity, Metadata, TOKEN_KEY};
    use lockbox_crypto::SigningKey;
    use lockbox_rpc::{Code, Method};

    fn setup() -> (AuthInterceptor, TokenService) {
        let tokens = TokenService::new(&SigningKey::from_bytes(b"test-key".to_vec()).unwrap());
        (AuthInterceptor::new(tokens.clone()), tokens)
    }

    #[tokio::test]
    async fn test_bypass_methods_skip_token() {
        let (interceptor, _) = setup();
        for method in [Method::Register, Method::Login] {
            let ctx = RequestContext::new(method, Metadata::new());
            let out = interceptor
                .unary(ctx, (), |ctx, ()| async move { Ok(ctx.identity().is_err()) })
                .await
                .unwrap();
            assert!(out);
        }
    }

    #[tokio::test]
    async fn test_missing_token_never_reaches_handler() {
        let (interceptor, _) = setup();
        let ctx = RequestContext::new(Method::GetResource, Metadata::new());
        let mut called = false;
        let status = interceptor
            .unary(ctx, (), |_, ()| {
                called = true;
                async { Ok(()) }
            })
            .await
            .unwrap_err();
        assert_eq!(status.code, Code::Unauthenticated);
        assert!(!called);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let (interceptor, _) = setup();
        let ctx = RequestContext::new(
            Method::DeleteResource,
            Metadata::new().with(TOKEN_KEY, "bogus"),
        );
        let status = interceptor
            .unary(ctx, (), |_, ()| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(status.code, Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_unary_handler_sees_identity() {
        let (interceptor, tokens) = setup();
        let id = Identity::generate();
        let token = tokens.issue(id, Duration::minutes(1)).unwrap().token;
        let ctx = RequestContext::new(Method::GetResource, Metadata::new().with(TOKEN_KEY, token));

        let seen = interceptor
            .unary(ctx, (), |ctx, ()| async move { ctx.identity() })
            .await
            .unwrap();
        assert_eq!(seen, id);
    }

    #[tokio::test]
    async fn test_streaming_handler_sees_identity() {
        let (interceptor, tokens) = setup();
        let id = Identity::generate();
        let token = tokens.issue(id, Duration::minutes(1)).unwrap().token;
        let inner = VecInbound {
            context: RequestContext::new(Method::SaveFile, Metadata::new().with(TOKEN_KEY, token)),
            items: vec![Ok(7u8)].into(),
        };

        let (seen, first) = interceptor
            .streaming(inner, |mut stream| async move {
                let first = stream.recv().await.unwrap().unwrap();
                Ok((stream.context().identity()?, first))
            })
            .await
            .unwrap();
        assert_eq!(seen, id);
        assert_eq!(first, 7);
    }

    #[tokio::test]
    async fn test_streaming_rejects_expired() {
        let (interceptor, tokens) = setup();
        let token = tokens
            .generate(Identity::generate(), chrono::Utc::now() - Duration::seconds(5))
            .unwrap();
        let inner = VecInbound::<u8> {
            context: RequestContext::new(Method::SaveFile, Metadata::new().with(TOKEN_KEY, token)),
            items: Default::default(),
        };
        let status = interceptor
            .streaming(inner, |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(status.code, Code::Unauthenticated);
    }
}
