//! Upload job history listing

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::shared::pagination::{Paginated, PaginationParams};
use crate::models::UploadJob;
use crate::pipeline::store;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListUploadJobsQuery {
    /// Paging fields are inlined because query-string deserialization
    /// cannot coerce numbers through a flattened struct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

impl ListUploadJobsQuery {
    pub fn paging(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListUploadJobsError {
    #[error("{0}")]
    InvalidPagination(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Paginated<UploadJob>, ListUploadJobsError>> for ListUploadJobsQuery {}

impl crate::cqrs::middleware::Query for ListUploadJobsQuery {}

#[tracing::instrument(skip(pool, query), fields(page = query.paging().page()))]
pub async fn handle(
    pool: PgPool,
    query: ListUploadJobsQuery,
) -> Result<Paginated<UploadJob>, ListUploadJobsError> {
    let paging = query.paging();
    paging
        .validate()
        .map_err(ListUploadJobsError::InvalidPagination)?;

    let (jobs, total) =
        store::list_upload_jobs(&pool, paging.per_page(), paging.offset()).await?;

    Ok(Paginated::from_items(jobs, &paging, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_parse_from_query_string() {
        let query: ListUploadJobsQuery =
            serde_urlencoded::from_str("page=2&per_page=50").unwrap();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.per_page, Some(50));
        assert_eq!(query.paging().offset(), 50);
    }
}
