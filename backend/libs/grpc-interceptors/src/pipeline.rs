//! Pipeline composer
//!
//! Builds the fixed `Logging -> Recovery -> Auth -> handler` chain and drives
//! unary and streaming calls through it. Every method of every service goes
//! through the same three stages in the same order; there is no per-method
//! customization beyond the auth stage's public-method set.
//!
//! The method name of a call is the [`GrpcRoute`] recorded by
//! [`RouteLayer`](crate::RouteLayer). Calls without one are logged under
//! [`UNROUTED_METHOD`] and, never being public, must authenticate.

use std::future::Future;
use std::sync::Arc;

use futures::{FutureExt, Stream};
use token_codec::TokenCodec;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::{Extensions, Request, Response, Status};
use tracing::{debug, warn};

use crate::auth::{AuthInterceptor, PublicMethods};
use crate::call::UnaryCall;
use crate::context::{CallContext, CallDescriptor, CallKind};
use crate::interceptor::{chain, CallScope, Handler, Interceptor};
use crate::logger::CallLogger;
use crate::logging::LoggingInterceptor;
use crate::recovery::RecoveryInterceptor;
use crate::route::GrpcRoute;
use crate::stream::ServerStream;

/// Capacity of the outbound channel created by [`Pipeline::spawn_stream`]
const OUTBOUND_BUFFER: usize = 32;

/// Method name given to calls that carry no [`GrpcRoute`]
pub const UNROUTED_METHOD: &str = "<unrouted>";

/// Shared, cheaply cloneable interceptor pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    logging: LoggingInterceptor,
    recovery: RecoveryInterceptor,
    auth: AuthInterceptor,
    logger: CallLogger,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(codec: Arc<TokenCodec>, public_methods: PublicMethods, logger: CallLogger) -> Self {
        Self {
            inner: Arc::new(Inner {
                logging: LoggingInterceptor::new(logger.clone()),
                recovery: RecoveryInterceptor::new(logger.clone()),
                auth: AuthInterceptor::new(codec, public_methods, logger.clone()),
                logger,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Root token every call's cancellation token descends from
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Cancel every in-flight call
    ///
    /// Handlers blocked in [`CallContext::run`] (or reading/writing a
    /// [`ServerStream`]) observe `Status::cancelled`.
    pub fn shutdown(&self) {
        self.inner.logger.emit(|| debug!("cancelling in-flight calls"));
        self.inner.shutdown.cancel();
    }

    fn stages<C, T>(&self) -> [&dyn Interceptor<C, T>; 3]
    where
        C: CallScope,
        T: Send + 'static,
    {
        [&self.inner.logging, &self.inner.recovery, &self.inner.auth]
    }

    fn routed_method(&self, extensions: &Extensions, kind: CallKind) -> String {
        match extensions.get::<GrpcRoute>() {
            Some(route) => route.path().to_owned(),
            None => {
                self.inner.logger.emit(|| {
                    warn!(kind = kind.as_str(), "call has no recorded route, treating it as protected")
                });
                UNROUTED_METHOD.to_owned()
            }
        }
    }

    fn call_context(&self, method: &str, kind: CallKind, metadata: MetadataMap) -> CallContext {
        CallContext::new(
            CallDescriptor::new(method, kind, metadata),
            self.inner.shutdown.child_token(),
        )
    }

    /// Run a unary call through the chain
    ///
    /// The handler receives the original request with the final
    /// [`CallContext`] stored in its extensions; read it through
    /// [`IdentityExt`](crate::IdentityExt).
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: FnOnce(Request<Req>) -> Fut + Send,
        Fut: Future<Output = Result<Response<Resp>, Status>> + Send,
    {
        let method = self.routed_method(request.extensions(), CallKind::Unary);
        let context = self.call_context(&method, CallKind::Unary, request.metadata().clone());
        let call = UnaryCall::new(context, request);

        let handler: Handler<'_, UnaryCall<Req>, Response<Resp>> =
            Box::new(move |call: UnaryCall<Req>| {
                async move {
                    let context = call.context().clone();
                    context.run(handler(call.into_request())).await
                }
                .boxed()
            });

        let stages = self.stages::<UnaryCall<Req>, Response<Resp>>();
        chain(&stages, handler).run(call).await
    }

    /// Run a streaming call through the chain, writing responses to `outbound`
    ///
    /// Authentication happens once, before the handler sees the stream. The
    /// returned status is the outcome of the whole stream.
    pub async fn serve_stream<S, In, Out, F, Fut>(
        &self,
        request: Request<S>,
        outbound: mpsc::Sender<Result<Out, Status>>,
        handler: F,
    ) -> Result<(), Status>
    where
        S: Stream<Item = Result<In, Status>> + Send + 'static,
        In: Send + 'static,
        Out: Send + 'static,
        F: FnOnce(ServerStream<In, Out>) -> Fut + Send,
        Fut: Future<Output = Result<(), Status>> + Send,
    {
        let (metadata, extensions, inbound) = request.into_parts();
        let method = self.routed_method(&extensions, CallKind::Streaming);
        let context = self.call_context(&method, CallKind::Streaming, metadata);
        let stream = ServerStream::new(context, inbound, outbound);

        let handler: Handler<'_, ServerStream<In, Out>, ()> =
            Box::new(move |stream: ServerStream<In, Out>| {
                async move {
                    let context = stream.context().clone();
                    context.run(handler(stream)).await
                }
                .boxed()
            });

        let stages = self.stages::<ServerStream<In, Out>, ()>();
        chain(&stages, handler).run(stream).await
    }

    /// Spawn a streaming call on its own task and hand back the response stream
    ///
    /// Messages sent by the handler arrive in order; a failed outcome
    /// (rejection, recovered panic, cancellation, handler error) is delivered
    /// as the final item.
    pub fn spawn_stream<S, In, Out, F, Fut>(
        &self,
        request: Request<S>,
        handler: F,
    ) -> Response<ReceiverStream<Result<Out, Status>>>
    where
        S: Stream<Item = Result<In, Status>> + Send + 'static,
        In: Send + 'static,
        Out: Send + 'static,
        F: FnOnce(ServerStream<In, Out>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let pipeline = self.clone();

        tokio::spawn(async move {
            if let Err(status) = pipeline.serve_stream(request, tx.clone(), handler).await {
                // Receiver already gone means the client is not listening anymore
                let _ = tx.send(Err(status)).await;
            }
        });

        Response::new(ReceiverStream::new(rx))
    }
}
