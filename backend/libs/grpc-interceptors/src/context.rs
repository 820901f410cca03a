//! Per-call context
//!
//! A [`CallContext`] pairs the immutable [`CallDescriptor`] of an inbound
//! call with its cancellation token, optional deadline and, once the auth
//! stage has run, the verified [`IdentityContext`]. Contexts are never
//! mutated in place: attaching an identity produces a new value.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::Status;

use crate::identity::IdentityContext;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Shape of the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Streaming,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Unary => "unary",
            CallKind::Streaming => "stream",
        }
    }
}

/// Identifying metadata of an inbound call
#[derive(Debug)]
pub struct CallDescriptor {
    method: String,
    kind: CallKind,
    metadata: MetadataMap,
}

impl CallDescriptor {
    pub fn new(method: impl Into<String>, kind: CallKind, metadata: MetadataMap) -> Self {
        Self {
            method: method.into(),
            kind,
            metadata,
        }
    }

    /// Fully-qualified method name, e.g. `/user.UserService/Login`
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Incoming request metadata
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }
}

/// Context shared by every stage of a single call
#[derive(Debug, Clone)]
pub struct CallContext {
    descriptor: Arc<CallDescriptor>,
    identity: Option<Arc<IdentityContext>>,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// Build the context for a new call
    ///
    /// The deadline comes from the `grpc-timeout` metadata entry when the
    /// client sent a valid one.
    pub fn new(descriptor: CallDescriptor, cancellation: CancellationToken) -> Self {
        let deadline = descriptor
            .metadata()
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
            .and_then(|timeout| Instant::now().checked_add(timeout));

        Self {
            descriptor: Arc::new(descriptor),
            identity: None,
            deadline,
            cancellation,
        }
    }

    pub fn method(&self) -> &str {
        self.descriptor.method()
    }

    pub fn kind(&self) -> CallKind {
        self.descriptor.kind()
    }

    pub fn metadata(&self) -> &MetadataMap {
        self.descriptor.metadata()
    }

    /// Verified caller, `None` for anonymous calls to public methods
    pub fn identity(&self) -> Option<&IdentityContext> {
        self.identity.as_deref()
    }

    pub fn subject_id(&self) -> Option<i64> {
        self.identity().map(IdentityContext::subject_id)
    }

    pub fn username(&self) -> Option<&str> {
        self.identity().map(IdentityContext::username)
    }

    pub fn email(&self) -> Option<&str> {
        self.identity().map(IdentityContext::email)
    }

    /// New context carrying `identity`; `self` is left untouched
    pub fn with_identity(&self, identity: IdentityContext) -> Self {
        Self {
            identity: Some(Arc::new(identity)),
            ..self.clone()
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` until it completes, the call is cancelled or the deadline passes
    ///
    /// Cancellation wins over the deadline, which wins over completion, when
    /// several are ready at once.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Status::cancelled("call cancelled")),
            _ = deadline => Err(Status::deadline_exceeded("deadline exceeded")),
            result = fut => result,
        }
    }
}

/// Parse a `grpc-timeout` value: at most 8 digits followed by a unit
/// (`H`, `M`, `S`, `m`, `u`, `n`)
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}
