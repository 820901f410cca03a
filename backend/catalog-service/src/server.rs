//! Server assembly: one pipeline shared by every service, plus health reporting

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use grpc_interceptors::{CallLogger, Pipeline, RouteLayer};
use token_codec::TokenCodec;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::server::{health_reporter, HealthReporter};
use tracing::{info, warn};

use crate::grpc::proto::product::product_service_server::ProductServiceServer;
use crate::grpc::proto::user::user_service_server::UserServiceServer;
use crate::grpc::{public_methods, ProductGrpcService, UserGrpcService};
use crate::repository::{
    InMemoryProductRepository, InMemoryUserRepository, ProductRepository, UserRepository,
};
use crate::services::{ProductService, UserService};

pub struct CatalogServer {
    pipeline: Pipeline,
    users: UserGrpcService,
    products: ProductGrpcService,
}

impl CatalogServer {
    /// Server backed by in-memory storage
    pub fn new(codec: Arc<TokenCodec>, logger: CallLogger) -> Self {
        Self::with_repositories(
            codec,
            logger,
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryProductRepository::new()),
        )
    }

    pub fn with_repositories(
        codec: Arc<TokenCodec>,
        logger: CallLogger,
        user_repo: Arc<dyn UserRepository>,
        product_repo: Arc<dyn ProductRepository>,
    ) -> Self {
        let pipeline = Pipeline::new(codec.clone(), public_methods(), logger);
        let users = UserGrpcService::new(pipeline.clone(), UserService::new(user_repo, codec));
        let products = ProductGrpcService::new(pipeline.clone(), ProductService::new(product_repo));

        Self {
            pipeline,
            users,
            products,
        }
    }

    /// Serve on `listener` until `shutdown` resolves
    ///
    /// On shutdown, health flips to not-serving and every in-flight call is
    /// cancelled. Connections still open after `drain_timeout` are dropped.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F, drain_timeout: Duration) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().context("Failed to read listener address")?;
        let (mut health, health_service) = health_reporter();
        set_serving(&mut health, true).await;

        let pipeline = self.pipeline.clone();
        let stopped = pipeline.shutdown_token();
        let signal = async move {
            shutdown.await;
            info!("Shutdown requested, cancelling in-flight calls");
            set_serving(&mut health, false).await;
            pipeline.shutdown();
        };

        info!("Starting gRPC server on {}", addr);

        let server = Server::builder()
            .layer(RouteLayer::new())
            .add_service(health_service)
            .add_service(UserServiceServer::new(self.users))
            .add_service(ProductServiceServer::new(self.products))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal);
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => result.context("gRPC server error")?,
            _ = async {
                stopped.cancelled().await;
                tokio::time::sleep(drain_timeout).await;
            } => {
                warn!(?drain_timeout, "Drain timeout elapsed, dropping remaining connections");
            }
        }

        info!("Catalog service shutdown complete");
        Ok(())
    }
}

async fn set_serving(health: &mut HealthReporter, serving: bool) {
    if serving {
        health.set_serving::<UserServiceServer<UserGrpcService>>().await;
        health.set_serving::<ProductServiceServer<ProductGrpcService>>().await;
    } else {
        health.set_not_serving::<UserServiceServer<UserGrpcService>>().await;
        health.set_not_serving::<ProductServiceServer<ProductGrpcService>>().await;
    }
}
