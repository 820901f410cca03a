/// Catalog Service Main Entry Point
///
/// Starts the gRPC server with:
/// - User and product services behind the interceptor pipeline
/// - gRPC health reporting
/// - Graceful shutdown on Ctrl+C or SIGTERM
use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_service::{config::Settings, telemetry, CatalogServer};
use grpc_interceptors::CallLogger;
use token_codec::TokenCodec;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    telemetry::init(&settings.log).context("Failed to initialize logging")?;

    let codec = Arc::new(TokenCodec::new(settings.jwt.secret.clone(), settings.jwt.ttl()));
    info!(
        environment = ?settings.environment,
        token_ttl_secs = codec.ttl().num_seconds(),
        "Starting catalog service"
    );
    if settings.environment.is_development() && settings.jwt.secret_len() < 32 {
        warn!("JWT_SECRET is shorter than 32 bytes (development only)");
    }

    let server = CatalogServer::new(codec, CallLogger::current());

    let addr = settings.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gRPC listener on {addr}"))?;

    server
        .serve(listener, shutdown_signal(), settings.server.shutdown_timeout())
        .await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
