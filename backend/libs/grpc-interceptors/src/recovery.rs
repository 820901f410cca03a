//! Panic containment
//!
//! A panic raised while the inner stages (and ultimately the handler) are
//! being polled is caught here and turned into a single `Internal` status.
//! Only panics inside `next` are caught; this stage never sees what happens
//! outward of it. Cancellation and deadline outcomes are plain `Err` values
//! and pass through untouched.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tonic::Status;
use tracing::error;

use crate::interceptor::{BoxFuture, CallScope, Interceptor, Next};
use crate::logger::CallLogger;

pub(crate) const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone)]
pub struct RecoveryInterceptor {
    logger: CallLogger,
}

impl RecoveryInterceptor {
    pub fn new(logger: CallLogger) -> Self {
        Self { logger }
    }
}

impl<C, T> Interceptor<C, T> for RecoveryInterceptor
where
    C: CallScope,
    T: Send + 'static,
{
    fn intercept<'a>(&'a self, call: C, next: Next<'a, C, T>) -> BoxFuture<'a, Result<T, Status>> {
        Box::pin(async move {
            let method = call.context().method().to_owned();
            let kind = call.context().kind();

            match AssertUnwindSafe(next.run(call)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let panic = panic_message(payload.as_ref());
                    self.logger.emit(|| {
                        error!(
                            method = %method,
                            kind = kind.as_str(),
                            panic = %panic,
                            "recovered from panic in gRPC handler"
                        )
                    });
                    Err(Status::internal(INTERNAL_ERROR_MESSAGE))
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
