//! Dashboard API routes
//!
//! - `GET /api/v1/dashboard/stats` - Aggregate counts for the dashboard

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::FeatureState;

use super::queries::{DashboardStatsError, DashboardStatsQuery};

pub fn dashboard_routes() -> Router<FeatureState> {
    Router::new().route("/stats", get(dashboard_stats))
}

#[tracing::instrument(skip(state))]
async fn dashboard_stats(
    State(state): State<FeatureState>,
) -> Result<Response, DashboardApiError> {
    let stats =
        super::queries::stats::handle(state.db, state.cache, DashboardStatsQuery::default())
            .await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(stats))).into_response())
}

#[derive(Debug)]
struct DashboardApiError(DashboardStatsError);

impl From<DashboardStatsError> for DashboardApiError {
    fn from(err: DashboardStatsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for DashboardApiError {
    fn into_response(self) -> Response {
        tracing::error!("Dashboard API error: {}", self.0);
        let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
    }
}
