//! Unary call scope

use tonic::Request;

use crate::context::CallContext;
use crate::interceptor::CallScope;

/// A unary request travelling through the pipeline
///
/// The context rides next to the request until the handler is reached; only
/// then is it placed into the request extensions (see [`UnaryCall::into_request`]).
#[derive(Debug)]
pub struct UnaryCall<Req> {
    context: CallContext,
    request: Request<Req>,
}

impl<Req> UnaryCall<Req> {
    pub fn new(context: CallContext, request: Request<Req>) -> Self {
        Self { context, request }
    }

    /// Hand the request to business code with the final context attached
    pub fn into_request(self) -> Request<Req> {
        let Self {
            context,
            mut request,
        } = self;
        request.extensions_mut().insert(context);
        request
    }
}

impl<Req: Send + 'static> CallScope for UnaryCall<Req> {
    fn context(&self) -> &CallContext {
        &self.context
    }

    fn with_context(self, context: CallContext) -> Self {
        Self {
            context,
            request: self.request,
        }
    }
}
