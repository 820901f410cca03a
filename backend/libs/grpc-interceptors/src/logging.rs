//! Outermost stage: call outcome and latency

use std::time::Instant;

use tonic::{Code, Status};
use tracing::{error, info};

use crate::context::CallKind;
use crate::interceptor::{BoxFuture, CallScope, Interceptor, Next};
use crate::logger::CallLogger;

const DROPPED_CALL_MESSAGE: &str = "call dropped before completion";

/// Records `{method, duration}` for every call, plus `error` on failure
///
/// The result is returned exactly as produced by the inner stages. A call
/// whose future is dropped before it finishes (client went away, task
/// aborted) is still recorded, as a failure with code `Cancelled`.
#[derive(Debug, Clone)]
pub struct LoggingInterceptor {
    logger: CallLogger,
}

impl LoggingInterceptor {
    pub fn new(logger: CallLogger) -> Self {
        Self { logger }
    }
}

impl<C, T> Interceptor<C, T> for LoggingInterceptor
where
    C: CallScope,
    T: Send + 'static,
{
    fn intercept<'a>(&'a self, call: C, next: Next<'a, C, T>) -> BoxFuture<'a, Result<T, Status>> {
        Box::pin(async move {
            let record = CallRecord {
                logger: &self.logger,
                method: call.context().method().to_owned(),
                kind: call.context().kind(),
                started: Instant::now(),
                finished: false,
            };

            let result = next.run(call).await;
            record.finish(&result);
            result
        })
    }
}

/// Exit record of one call, written on completion or on drop
struct CallRecord<'a> {
    logger: &'a CallLogger,
    method: String,
    kind: CallKind,
    started: Instant,
    finished: bool,
}

impl CallRecord<'_> {
    fn finish<T>(mut self, result: &Result<T, Status>) {
        self.finished = true;
        match result {
            Ok(_) => self.completed(),
            Err(status) => self.failed(status.code(), status.message()),
        }
    }

    fn completed(&self) {
        let method = &self.method;
        let duration = self.started.elapsed();
        self.logger.emit(|| match self.kind {
            CallKind::Unary => {
                info!(method = %method, duration = ?duration, "gRPC unary request completed")
            }
            CallKind::Streaming => {
                info!(method = %method, duration = ?duration, "gRPC stream request completed")
            }
        });
    }

    fn failed(&self, code: Code, message: &str) {
        let method = &self.method;
        let duration = self.started.elapsed();
        self.logger.emit(|| match self.kind {
            CallKind::Unary => error!(
                method = %method,
                duration = ?duration,
                code = ?code,
                error = %message,
                "gRPC unary request failed"
            ),
            CallKind::Streaming => error!(
                method = %method,
                duration = ?duration,
                code = ?code,
                error = %message,
                "gRPC stream request failed"
            ),
        });
    }
}

impl Drop for CallRecord<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.failed(Code::Cancelled, DROPPED_CALL_MESSAGE);
        }
    }
}
