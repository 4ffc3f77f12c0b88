pub mod response;

use crate::config::CorsConfig;
use crate::db;
use crate::error::AppResult;
use crate::features::{self, FeatureState};
use crate::middleware;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

/// Build the full application router with middleware applied.
pub fn create_router(state: FeatureState, cors: &CorsConfig) -> Router {
    let api_v1 = features::router(state.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Roster Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<FeatureState>) -> AppResult<impl IntoResponse> {
    db::health_check(&state.db).await?;

    // The cache is best-effort everywhere else, so an unreachable Redis
    // degrades the report instead of failing the probe.
    let cache = match state.cache.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health probe could not reach Redis");
            "unavailable"
        },
    };

    Ok(Json(json!({
        "status": "healthy",
        "database": "connected",
        "cache": cache
    })))
}
