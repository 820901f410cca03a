//! Catalog Service Library
//!
//! User accounts and a product catalog exposed over gRPC. Every call runs
//! through the shared interceptor pipeline from `grpc-interceptors`:
//! logging, panic recovery, then bearer-token authentication.
//!
//! ## Modules
//!
//! - `config`: environment-driven settings
//! - `telemetry`: tracing subscriber setup
//! - `models`: domain types and input validation
//! - `repository`: storage traits and in-memory implementations
//! - `security`: Argon2 password hashing
//! - `services`: business logic for users and products
//! - `grpc`: protobuf types and service adapters
//! - `server`: service assembly, health reporting and graceful shutdown

pub mod config;
pub mod error;
pub mod grpc;
pub mod models;
pub mod repository;
pub mod security;
pub mod server;
pub mod services;
pub mod telemetry;

pub use error::{Result, ServiceError};
pub use server::CatalogServer;
