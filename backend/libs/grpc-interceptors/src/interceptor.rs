//! Interceptor capability and chain folding
//!
//! A stage receives the call and a [`Next`] holding everything inward of it.
//! It may act before or after calling `next.run(call)`, skip it entirely, or
//! rewrite the outcome. Chains are plain slices of stages folded from the
//! outside in; no framework chaining helper is involved.

use tonic::Status;

use crate::context::CallContext;

pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// Innermost step of a chain: the business handler
pub type Handler<'a, C, T> = Box<dyn FnOnce(C) -> BoxFuture<'a, Result<T, Status>> + Send + 'a>;

/// Something that carries a [`CallContext`] through the chain
///
/// Implemented by [`UnaryCall`](crate::UnaryCall) and
/// [`ServerStream`](crate::ServerStream).
pub trait CallScope: Send + 'static {
    fn context(&self) -> &CallContext;

    /// Replace the context, returning a new scope around the same payload
    fn with_context(self, context: CallContext) -> Self;
}

/// One stage of the pipeline
///
/// `C` is the call scope and `T` the value the chain produces on success.
pub trait Interceptor<C, T>: Send + Sync {
    fn intercept<'a>(&'a self, call: C, next: Next<'a, C, T>) -> BoxFuture<'a, Result<T, Status>>;
}

/// Remainder of the chain inward of the current stage
pub struct Next<'a, C, T> {
    stages: &'a [&'a dyn Interceptor<C, T>],
    handler: Handler<'a, C, T>,
}

impl<'a, C, T> Next<'a, C, T> {
    /// Invoke the next stage, or the handler once no stages remain
    pub fn run(self, call: C) -> BoxFuture<'a, Result<T, Status>> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.intercept(
                call,
                Next {
                    stages: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(call),
        }
    }
}

/// Fold `stages` (outermost first) around `handler`
pub fn chain<'a, C, T>(
    stages: &'a [&'a dyn Interceptor<C, T>],
    handler: Handler<'a, C, T>,
) -> Next<'a, C, T> {
    Next { stages, handler }
}
