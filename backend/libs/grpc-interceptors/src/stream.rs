//! Streaming call scope
//!
//! A [`ServerStream`] bundles the inbound message stream, the outbound
//! sender and the call context. Stages that need a different context build a
//! new wrapper around the same channels via [`CallScope::with_context`], so
//! every message exchanged afterwards sees the replacement and nothing shared
//! is mutated.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tonic::Status;

use crate::context::CallContext;
use crate::interceptor::CallScope;

pub struct ServerStream<In, Out> {
    context: CallContext,
    inbound: BoxStream<'static, Result<In, Status>>,
    outbound: mpsc::Sender<Result<Out, Status>>,
}

impl<In, Out> ServerStream<In, Out> {
    pub fn new<S>(context: CallContext, inbound: S, outbound: mpsc::Sender<Result<Out, Status>>) -> Self
    where
        S: Stream<Item = Result<In, Status>> + Send + 'static,
    {
        Self {
            context,
            inbound: inbound.boxed(),
            outbound,
        }
    }

    /// Context of the stream, including the caller identity once authenticated
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Receive the next client message, `Ok(None)` once the client half-closes
    ///
    /// Returns `Cancelled` / `DeadlineExceeded` if the call ends while waiting.
    pub async fn message(&mut self) -> Result<Option<In>, Status> {
        let Self {
            context, inbound, ..
        } = self;

        context
            .run(async {
                match inbound.next().await {
                    Some(Ok(message)) => Ok(Some(message)),
                    Some(Err(status)) => Err(status),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Send one message to the client, in order
    pub async fn send(&mut self, message: Out) -> Result<(), Status> {
        let Self {
            context, outbound, ..
        } = self;

        context
            .run(async move {
                outbound
                    .send(Ok(message))
                    .await
                    .map_err(|_| Status::cancelled("client stream closed"))
            })
            .await
    }
}

impl<In, Out> CallScope for ServerStream<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn context(&self) -> &CallContext {
        &self.context
    }

    fn with_context(self, context: CallContext) -> Self {
        Self {
            context,
            inbound: self.inbound,
            outbound: self.outbound,
        }
    }
}

impl<In, Out> std::fmt::Debug for ServerStream<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerStream")
            .field("method", &self.context.method())
            .field("authenticated", &self.context.identity().is_some())
            .finish()
    }
}
