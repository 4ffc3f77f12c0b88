//! Per-row error listing for an upload job

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::shared::pagination::{Paginated, PaginationParams};
use crate::models::UploadErrorRecord;
use crate::pipeline::store;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListUploadErrorsQuery {
    /// Set from the URL path, not the query string.
    #[serde(default)]
    pub job_id: i32,

    /// Paging fields are inlined because query-string deserialization
    /// cannot coerce numbers through a flattened struct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

impl ListUploadErrorsQuery {
    pub fn paging(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListUploadErrorsError {
    #[error("Upload job {0} not found")]
    JobNotFound(i32),

    #[error("{0}")]
    InvalidPagination(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Paginated<UploadErrorRecord>, ListUploadErrorsError>>
    for ListUploadErrorsQuery
{
}

impl crate::cqrs::middleware::Query for ListUploadErrorsQuery {}

#[tracing::instrument(skip(pool, query), fields(job_id = query.job_id))]
pub async fn handle(
    pool: PgPool,
    query: ListUploadErrorsQuery,
) -> Result<Paginated<UploadErrorRecord>, ListUploadErrorsError> {
    let paging = query.paging();
    paging
        .validate()
        .map_err(ListUploadErrorsError::InvalidPagination)?;

    if store::get_upload_job(&pool, query.job_id).await?.is_none() {
        return Err(ListUploadErrorsError::JobNotFound(query.job_id));
    }

    let (errors, total) =
        store::list_upload_errors(&pool, query.job_id, paging.per_page(), paging.offset())
            .await?;

    Ok(Paginated::from_items(errors, &paging, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_parse_from_query_string() {
        let query: ListUploadErrorsQuery =
            serde_urlencoded::from_str("page=3&per_page=10").unwrap();
        assert_eq!(query.job_id, 0);
        assert_eq!(query.page, Some(3));
        assert_eq!(query.paging().offset(), 20);
    }
}
