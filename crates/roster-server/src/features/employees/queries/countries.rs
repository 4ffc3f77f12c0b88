//! Distinct country listing, used to populate filter dropdowns

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::cache::RecordCache;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListCountriesQuery {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCountriesResponse {
    pub countries: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListCountriesError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ListCountriesResponse, ListCountriesError>> for ListCountriesQuery {}

impl crate::cqrs::middleware::Query for ListCountriesQuery {}

#[tracing::instrument(skip(pool, cache, _query))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    _query: ListCountriesQuery,
) -> Result<ListCountriesResponse, ListCountriesError> {
    match cache.get_countries().await {
        Ok(Some(countries)) => return Ok(ListCountriesResponse { countries }),
        Ok(None) => {},
        Err(e) => tracing::warn!(error = %e, "Country cache read failed"),
    }

    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT country FROM employees ORDER BY country")
            .fetch_all(&pool)
            .await?;
    let countries: Vec<String> = rows.into_iter().map(|(c,)| c).collect();

    if let Err(e) = cache.set_countries(&countries).await {
        tracing::warn!(error = %e, "Country cache write failed");
    }

    Ok(ListCountriesResponse { countries })
}
