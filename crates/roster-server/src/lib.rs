//! Roster Server Library
//!
//! HTTP server for managing employee records with bulk spreadsheet ingestion.
//!
//! # Overview
//!
//! The Roster server provides a REST API backed by PostgreSQL:
//!
//! - **Employee CRUD**: create, list, update, and delete employee records
//! - **Upload Pipeline**: asynchronous three-stage spreadsheet processing
//!   (parse-validate, data-insert, error-logging) coordinated through a
//!   durable Postgres-backed job queue
//! - **Record Cache**: Redis-backed cursor-paginated cache in front of the
//!   read-heavy listing endpoints
//! - **Configuration**: environment-based configuration management
//! - **Middleware**: CORS and request tracing
//!
//! # Architecture
//!
//! HTTP features follow a **CQRS (Command Query Responsibility Segregation)**
//! layout: each feature is a vertical slice with `commands/` (writes),
//! `queries/` (reads), and `routes.rs`. The upload pipeline runs outside the
//! request path: the upload endpoint only persists the file and enqueues a
//! parse-validate job; queue workers do the rest and record per-row failures
//! in `upload_errors` for operator inspection.
//!
//! Cache failures are never propagated to clients: every cached read has a
//! direct database fallback.
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework
//! - **SQLx**: PostgreSQL driver and migrations
//! - **redis-rs**: cache store client
//! - **calamine**: spreadsheet reading
//!
//! # Example
//!
//! ```no_run
//! use roster_server::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     println!("binding to {}:{}", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod queue;

// Re-export commonly used types
pub use error::{AppError, AppResult};
