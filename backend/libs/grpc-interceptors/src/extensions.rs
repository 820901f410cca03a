//! Identity accessors for handler requests
//!
//! The pipeline stores the final [`CallContext`] in the request extensions
//! before calling a unary handler. These helpers read it back.

use tonic::{Request, Status};

use crate::context::CallContext;
use crate::identity::IdentityContext;

/// Typed access to the call context of a request that went through the pipeline
pub trait IdentityExt {
    fn call_context(&self) -> Option<&CallContext>;

    /// Verified caller, `None` for public methods called anonymously
    fn identity(&self) -> Option<&IdentityContext> {
        self.call_context().and_then(CallContext::identity)
    }

    fn subject_id(&self) -> Option<i64> {
        self.identity().map(IdentityContext::subject_id)
    }

    fn username(&self) -> Option<&str> {
        self.identity().map(IdentityContext::username)
    }

    fn email(&self) -> Option<&str> {
        self.identity().map(IdentityContext::email)
    }

    /// Identity or `Unauthenticated`, for handlers of protected methods
    fn require_identity(&self) -> Result<&IdentityContext, Status> {
        self.identity()
            .ok_or_else(|| Status::unauthenticated("authentication required"))
    }
}

impl<T> IdentityExt for Request<T> {
    fn call_context(&self) -> Option<&CallContext> {
        self.extensions().get::<CallContext>()
    }
}
