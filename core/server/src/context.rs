//! Per-call request context.

use lockbox_common::{Identity, Metadata};
use lockbox_rpc::{Method, Status};

/// Who is making the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Not (yet) authorized. Only bypass methods run this way.
    Anonymous,
    /// Token verified; the identity owns everything the call touches.
    Authenticated(Identity),
}

/// Everything a handler knows about its call besides the request body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    metadata: Metadata,
    caller: Caller,
}

impl RequestContext {
    /// Context for an inbound call, before authorization.
    pub fn new(method: Method, metadata: Metadata) -> Self {
        Self {
            method,
            metadata,
            caller: Caller::Anonymous,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn caller(&self) -> Caller {
        self.caller
    }

    /// Derived context carrying a verified identity.
    pub fn with_identity(&self, identity: Identity) -> Self {
        Self {
            method: self.method,
            metadata: self.metadata.clone(),
            caller: Caller::Authenticated(identity),
        }
    }

    /// The verified identity of the caller.
    ///
    /// # Errors
    /// - `Unauthenticated` if the context never went through authorization
    pub fn identity(&self) -> Result<Identity, Status> {
        match self.caller {
            Caller::Authenticated(id) => Ok(id),
            Caller::Anonymous => Err(Status::unauthenticated("token not found")),
        }
    }
}
