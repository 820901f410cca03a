//! End-to-end behaviour of the interceptor pipeline
//!
//! Calls are driven through `Pipeline` exactly as generated service code
//! does, with a recording subscriber injected as the call logger. Requests
//! carry the `GrpcRoute` that `RouteLayer` records on a real server.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use grpc_interceptors::{
    CallLogger, GrpcRoute, IdentityExt, Pipeline, PublicMethods, ServerStream, UNROUTED_METHOD,
};
use secrecy::SecretString;
use token_codec::TokenCodec;
use tonic::{Code, Request, Response, Status};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const SECRET: &str = "pipeline-integration-secret-0123456789";
const LOGIN: &str = "/user.UserService/Login";
const REGISTER: &str = "/user.UserService/Register";
const GET_PROFILE: &str = "/user.UserService/GetProfile";
const WATCH_PRODUCTS: &str = "/product.ProductService/WatchProducts";

// ============================================================================
// Log capture
// ============================================================================

#[derive(Debug, Clone)]
struct Record {
    level: Level,
    message: String,
    fields: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct LogCapture {
    records: Arc<Mutex<Vec<Record>>>,
}

impl LogCapture {
    fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    fn with_message(&self, message: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| record.message == message)
            .collect()
    }

    fn at_level(&self, level: Level) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.records.lock().unwrap().push(Record {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}

impl FieldVisitor {
    fn store(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn codec() -> TokenCodec {
    TokenCodec::new(SecretString::from(SECRET.to_string()), chrono::Duration::hours(1))
}

fn pipeline() -> (Pipeline, LogCapture) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let pipeline = Pipeline::new(
        Arc::new(codec()),
        PublicMethods::new([LOGIN, REGISTER]),
        CallLogger::new(Dispatch::new(subscriber)),
    );
    (pipeline, capture)
}

fn routed<T>(method: &str, message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.extensions_mut().insert(GrpcRoute::new(method));
    request
}

fn with_authorization<T>(method: &str, message: T, value: &str) -> Request<T> {
    let mut request = routed(method, message);
    request
        .metadata_mut()
        .insert("authorization", value.parse().unwrap());
    request
}

fn bearer<T>(method: &str, message: T, token: &str) -> Request<T> {
    with_authorization(method, message, &format!("Bearer {token}"))
}

fn alice_token() -> String {
    codec().issue(42, "alice", "a@x.com").unwrap()
}

async fn whoami(request: Request<()>) -> Result<Response<(i64, String, String)>, Status> {
    let identity = request.require_identity()?;
    Ok(Response::new((
        identity.subject_id(),
        identity.username().to_string(),
        identity.email().to_string(),
    )))
}

// ============================================================================
// Public methods
// ============================================================================

#[tokio::test]
async fn test_public_method_runs_without_credentials() {
    let (pipeline, capture) = pipeline();
    let invoked = Arc::new(AtomicUsize::new(0));

    let seen = invoked.clone();
    let response = pipeline
        .unary(routed(LOGIN, "credentials".to_string()), |request: Request<String>| async move {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(request.identity().is_none());
            assert_eq!(request.call_context().map(|c| c.method()), Some(LOGIN));
            Ok::<_, Status>(Response::new(request.into_inner().len()))
        })
        .await
        .unwrap();

    assert_eq!(response.into_inner(), "credentials".len());
    assert_eq!(invoked.load(Ordering::SeqCst), 1);

    let completed = capture.with_message("gRPC unary request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].level, Level::INFO);
    assert_eq!(completed[0].fields["method"], LOGIN);
    assert!(completed[0].fields.contains_key("duration"));
    assert!(capture.at_level(Level::ERROR).is_empty());
}

#[tokio::test]
async fn test_public_match_is_exact() {
    let (pipeline, _capture) = pipeline();

    let status = pipeline
        .unary(routed("/user.UserService/LoginAdmin", ()), whoami)
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_unrouted_call_must_authenticate() {
    let (pipeline, capture) = pipeline();
    let invoked = Arc::new(AtomicUsize::new(0));

    // No route recorded: the pipeline cannot know which method this is
    let seen = invoked.clone();
    let status = pipeline
        .unary(Request::new(()), |_request: Request<()>| async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Status>(Response::new(()))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(
        capture.with_message("gRPC unary request failed")[0].fields["method"],
        UNROUTED_METHOD
    );

    // A valid token still gets through, under the placeholder name
    let mut request = Request::new(());
    request.metadata_mut().insert(
        "authorization",
        format!("Bearer {}", alice_token()).parse().unwrap(),
    );
    let response = pipeline
        .unary(request, |request: Request<()>| async move {
            let method = request.call_context().map(|c| c.method().to_owned());
            Ok::<_, Status>(Response::new(method))
        })
        .await
        .unwrap();
    assert_eq!(response.into_inner().as_deref(), Some(UNROUTED_METHOD));
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_missing_credentials_rejected_before_handler() {
    let (pipeline, capture) = pipeline();
    let invoked = Arc::new(AtomicUsize::new(0));

    let seen = invoked.clone();
    let status = pipeline
        .unary(routed(GET_PROFILE, ()), |_request: Request<()>| async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Status>(Response::new(()))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    let warnings = capture.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].fields["reason"], "missing_credentials");

    let failures = capture.with_message("gRPC unary request failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].level, Level::ERROR);
    assert_eq!(failures[0].fields["method"], GET_PROFILE);
    assert!(failures[0].fields.contains_key("error"));
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let (pipeline, capture) = pipeline();

    let basic = pipeline
        .unary(with_authorization(GET_PROFILE, (), "Basic xyz"), whoami)
        .await
        .unwrap_err();
    let missing = pipeline
        .unary(routed(GET_PROFILE, ()), whoami)
        .await
        .unwrap_err();

    assert_eq!(basic.code(), Code::Unauthenticated);
    assert_eq!(basic.message(), missing.message());
    assert_eq!(capture.at_level(Level::WARN)[0].fields["reason"], "invalid_scheme");
}

#[tokio::test]
async fn test_token_failures_share_one_caller_message() {
    let (pipeline, capture) = pipeline();
    let expired = codec()
        .issue_with_ttl(42, "alice", "a@x.com", chrono::Duration::zero())
        .unwrap();
    let foreign = TokenCodec::new(
        SecretString::from("some-other-service-secret-0123456789".to_string()),
        chrono::Duration::hours(1),
    )
    .issue(42, "alice", "a@x.com")
    .unwrap();

    let mut messages = Vec::new();
    for token in [expired.as_str(), foreign.as_str(), "not-a-token"] {
        let status = pipeline
            .unary(bearer(GET_PROFILE, (), token), whoami)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        messages.push(status.message().to_string());
    }

    assert!(messages.windows(2).all(|pair| pair[0] == pair[1]));

    let reasons: Vec<String> = capture
        .at_level(Level::WARN)
        .into_iter()
        .map(|record| record.fields["reason"].clone())
        .collect();
    assert_eq!(reasons, vec!["token_expired", "bad_signature", "malformed_token"]);
}

// ============================================================================
// Identity propagation
// ============================================================================

#[tokio::test]
async fn test_valid_token_exposes_identity() {
    let (pipeline, _capture) = pipeline();

    let response = pipeline
        .unary(bearer(GET_PROFILE, (), &alice_token()), whoami)
        .await
        .unwrap();

    assert_eq!(
        response.into_inner(),
        (42, "alice".to_string(), "a@x.com".to_string())
    );
}

#[tokio::test]
async fn test_lowercase_scheme_accepted() {
    let (pipeline, _capture) = pipeline();

    let response = pipeline
        .unary(
            with_authorization(GET_PROFILE, (), &format!("bearer {}", alice_token())),
            whoami,
        )
        .await
        .unwrap();

    assert_eq!(response.into_inner().0, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_do_not_share_identity() {
    let (pipeline, _capture) = pipeline();
    let codec = codec();

    let calls = (1..=16_i64).map(|id| {
        let pipeline = pipeline.clone();
        let token = codec
            .issue(id, &format!("user-{id}"), &format!("user-{id}@x.com"))
            .unwrap();
        tokio::spawn(async move {
            pipeline
                .unary(bearer(GET_PROFILE, (), &token), |request: Request<()>| async move {
                    // Give other calls a chance to interleave before reading back
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    whoami(request).await
                })
                .await
        })
    });

    let results = futures::future::join_all(calls).await;

    for (index, result) in results.into_iter().enumerate() {
        let id = index as i64 + 1;
        let (subject_id, username, email) = result.unwrap().unwrap().into_inner();
        assert_eq!(subject_id, id);
        assert_eq!(username, format!("user-{id}"));
        assert_eq!(email, format!("user-{id}@x.com"));
    }
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_panicking_handler_becomes_internal() {
    let (pipeline, capture) = pipeline();

    let status = pipeline
        .unary(
            bearer(GET_PROFILE, Vec::<u32>::new(), &alice_token()),
            |request: Request<Vec<u32>>| async move {
                let items = request.into_inner();
                let first = items[0];
                Ok::<_, Status>(Response::new(first))
            },
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);

    let recovered = capture.with_message("recovered from panic in gRPC handler");
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].level, Level::ERROR);
    assert_eq!(recovered[0].fields["method"], GET_PROFILE);
    assert!(recovered[0].fields["panic"].contains("index out of bounds"));

    // Logged once as a failed call by the outer stage, with the recovered status
    let failures = capture.with_message("gRPC unary request failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].fields["code"], "Internal");

    // Pipeline keeps serving
    let response = pipeline
        .unary(bearer(GET_PROFILE, (), &alice_token()), whoami)
        .await
        .unwrap();
    assert_eq!(response.into_inner().0, 42);
}

#[tokio::test]
async fn test_business_error_is_not_rewritten() {
    let (pipeline, capture) = pipeline();

    let status = pipeline
        .unary(bearer(GET_PROFILE, (), &alice_token()), |_request: Request<()>| async move {
            Err::<Response<()>, Status>(Status::not_found("product 7 not found"))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "product 7 not found");
    assert!(capture.with_message("recovered from panic in gRPC handler").is_empty());
}

// ============================================================================
// Cancellation and deadlines
// ============================================================================

#[tokio::test]
async fn test_shutdown_cancels_in_flight_call() {
    let (pipeline, capture) = pipeline();
    let started = Arc::new(tokio::sync::Notify::new());

    let call = {
        let pipeline = pipeline.clone();
        let started = started.clone();
        tokio::spawn(async move {
            pipeline
                .unary(routed(LOGIN, ()), |_request: Request<()>| async move {
                    started.notify_one();
                    std::future::pending::<Result<Response<()>, Status>>().await
                })
                .await
        })
    };

    started.notified().await;
    pipeline.shutdown();

    let status = call.await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);
    assert!(capture.with_message("recovered from panic in gRPC handler").is_empty());
    assert_eq!(
        capture.with_message("gRPC unary request failed")[0].fields["code"],
        "Cancelled"
    );
}

#[tokio::test]
async fn test_dropped_call_is_logged_as_cancelled() {
    let (pipeline, capture) = pipeline();
    let started = Arc::new(tokio::sync::Notify::new());

    let call = {
        let pipeline = pipeline.clone();
        let started = started.clone();
        tokio::spawn(async move {
            pipeline
                .unary(routed(LOGIN, ()), |_request: Request<()>| async move {
                    started.notify_one();
                    std::future::pending::<Result<Response<()>, Status>>().await
                })
                .await
        })
    };

    started.notified().await;
    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());

    let failures = capture.with_message("gRPC unary request failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].level, Level::ERROR);
    assert_eq!(failures[0].fields["method"], LOGIN);
    assert_eq!(failures[0].fields["code"], "Cancelled");
    assert!(failures[0].fields.contains_key("duration"));
    assert!(capture.with_message("gRPC unary request completed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_grpc_timeout_becomes_deadline_exceeded() {
    let (pipeline, _capture) = pipeline();
    let mut request = bearer(GET_PROFILE, (), &alice_token());
    request
        .metadata_mut()
        .insert("grpc-timeout", "50m".parse().unwrap());

    let status = pipeline
        .unary(request, |_request: Request<()>| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Status>(Response::new(()))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::DeadlineExceeded);
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_stream_authenticates_once_and_preserves_order() {
    let (pipeline, capture) = pipeline();
    let inbound = futures::stream::iter((1..=50).map(Ok::<i32, Status>));

    let response = pipeline.spawn_stream(
        bearer(WATCH_PRODUCTS, inbound, &alice_token()),
        |mut stream: ServerStream<i32, (i64, i32)>| async move {
            while let Some(value) = stream.message().await? {
                let subject_id = stream.context().subject_id().unwrap_or_default();
                stream.send((subject_id, value)).await?;
            }
            Ok::<(), Status>(())
        },
    );

    let received: Vec<(i64, i32)> = response
        .into_inner()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(received, (1..=50).map(|v| (42, v)).collect::<Vec<_>>());
    assert_eq!(capture.with_message("request authenticated").len(), 1);

    let completed = capture.with_message("gRPC stream request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].fields["method"], WATCH_PRODUCTS);
}

#[tokio::test]
async fn test_unauthenticated_stream_never_reaches_handler() {
    let (pipeline, capture) = pipeline();
    let invoked = Arc::new(AtomicUsize::new(0));

    let seen = invoked.clone();
    let response = pipeline.spawn_stream(
        routed(WATCH_PRODUCTS, futures::stream::iter(vec![Ok::<i32, Status>(1)])),
        move |_stream: ServerStream<i32, i32>| async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<(), Status>(())
        },
    );

    let items: Vec<Result<i32, Status>> = response.into_inner().collect().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), Code::Unauthenticated);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(capture.with_message("gRPC stream request failed").len(), 1);
}

#[tokio::test]
async fn test_stream_panic_ends_stream_with_internal() {
    let (pipeline, capture) = pipeline();
    let inbound = futures::stream::iter((1..=3).map(Ok::<i32, Status>));

    let response = pipeline.spawn_stream(
        bearer(WATCH_PRODUCTS, inbound, &alice_token()),
        |mut stream: ServerStream<i32, i32>| async move {
            while let Some(value) = stream.message().await? {
                if value == 3 {
                    panic!("unexpected product state");
                }
                stream.send(value).await?;
            }
            Ok::<(), Status>(())
        },
    );

    let items: Vec<Result<i32, Status>> = response.into_inner().collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(*items[0].as_ref().unwrap(), 1);
    assert_eq!(*items[1].as_ref().unwrap(), 2);
    assert_eq!(items[2].as_ref().unwrap_err().code(), Code::Internal);

    let recovered = capture.with_message("recovered from panic in gRPC handler");
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].fields["panic"], "unexpected product state");
}

#[tokio::test]
async fn test_serve_stream_reports_outcome_directly() {
    let (pipeline, _capture) = pipeline();
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);

    let outcome = pipeline
        .serve_stream(
            bearer(
                WATCH_PRODUCTS,
                futures::stream::iter(vec![Ok::<i32, Status>(7)]),
                &alice_token(),
            ),
            tx,
            |mut stream: ServerStream<i32, i32>| async move {
                let value = stream.message().await?.unwrap_or_default();
                stream.send(value).await?;
                Err::<(), Status>(Status::failed_precondition("watch closed by server"))
            },
        )
        .await;

    assert_eq!(outcome.unwrap_err().code(), Code::FailedPrecondition);
    assert_eq!(rx.recv().await.unwrap().unwrap(), 7);
}
