//! Feature modules implementing the roster API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern: `commands/` for writes, `queries/`
//! for reads, `routes.rs` wiring them to HTTP.
//!
//! # Features
//!
//! - **employees**: CRUD and bulk updates for employee records, with
//!   cursor-paginated cached listing
//! - **uploads**: Spreadsheet submission and job/error tracking for the
//!   async import pipeline
//! - **dashboard**: Cached aggregate statistics

pub mod dashboard;
pub mod employees;
pub mod shared;
pub mod uploads;

use std::sync::Arc;

use axum::Router;

use crate::cache::RecordCache;
use crate::config::UploadsConfig;
use crate::queue::JobQueue;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool
    pub db: sqlx::PgPool,
    /// Redis record cache
    pub cache: RecordCache,
    /// Durable job queue for the upload pipeline
    pub queue: Arc<JobQueue>,
    /// Where uploaded files are staged
    pub uploads: UploadsConfig,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/employees", employees::employees_routes())
        .nest("/uploads", uploads::uploads_routes())
        .nest("/dashboard", dashboard::dashboard_routes())
        .with_state(state)
}
