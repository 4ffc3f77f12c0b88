//! Cursor-paginated employee listing
//!
//! Unfiltered reads are served from the Redis dataset cache, hydrating it
//! from Postgres on a miss. Filtered reads always hit Postgres: the cache
//! holds only the one canonical ordering, and caching every filter
//! combination would evict faster than it hits. Any cache failure degrades
//! to the database path.

use chrono::NaiveDate;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};

use crate::cache::RecordCache;
use crate::features::shared::pagination::CursorParams;
use crate::models::Employee;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListEmployeesQuery {
    /// Id of the last record already seen; absent or zero starts from the
    /// top. Paging fields are inlined because query-string deserialization
    /// cannot coerce numbers through a flattened struct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<i32>,

    /// Records per page. Defaults to 20, clamped to 1-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    /// Exact match on country.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Exact match on gender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// Case-insensitive substring match on first or last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Inclusive age range bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_max: Option<i32>,

    /// Inclusive joining-date range bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl ListEmployeesQuery {
    pub fn paging(&self) -> CursorParams {
        CursorParams {
            cursor: self.cursor,
            limit: self.limit,
        }
    }

    pub fn has_filters(&self) -> bool {
        self.country.is_some()
            || self.gender.is_some()
            || self.search.is_some()
            || self.age_min.is_some()
            || self.age_max.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEmployeesResponse {
    pub items: Vec<Employee>,
    /// Feed back as `cursor` to fetch the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i32>,
    pub has_next: bool,
    /// True when the page was served from Redis rather than Postgres.
    pub cached: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ListEmployeesError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ListEmployeesResponse, ListEmployeesError>> for ListEmployeesQuery {}

impl crate::cqrs::middleware::Query for ListEmployeesQuery {}

#[tracing::instrument(
    skip(pool, cache, query),
    fields(cursor = query.paging().cursor(), limit = query.paging().limit())
)]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    query: ListEmployeesQuery,
) -> Result<ListEmployeesResponse, ListEmployeesError> {
    let paging = query.paging();
    let cursor = paging.cursor();
    let limit = paging.limit();

    if !query.has_filters() {
        match page_from_cache(&pool, &cache, cursor, limit).await {
            Ok((items, has_next)) => return Ok(build_response(items, has_next, true)),
            Err(e) => {
                tracing::warn!(error = %e, "Record cache unavailable, serving from database");
            },
        }
    }

    let mut builder = QueryBuilder::new("SELECT * FROM employees WHERE id > ");
    builder.push_bind(cursor);

    if let Some(ref country) = query.country {
        builder.push(" AND country = ").push_bind(country);
    }
    if let Some(ref gender) = query.gender {
        builder.push(" AND gender = ").push_bind(gender);
    }
    if let Some(ref search) = query.search {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (firstname ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR lastname ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(age_min) = query.age_min {
        builder.push(" AND age >= ").push_bind(age_min);
    }
    if let Some(age_max) = query.age_max {
        builder.push(" AND age <= ").push_bind(age_max);
    }
    if let Some(date_from) = query.date_from {
        builder.push(" AND date >= ").push_bind(date_from);
    }
    if let Some(date_to) = query.date_to {
        builder.push(" AND date <= ").push_bind(date_to);
    }

    builder.push(" ORDER BY id LIMIT ");
    builder.push_bind((limit + 1) as i64);

    let mut items: Vec<Employee> = builder.build_query_as().fetch_all(&pool).await?;

    let has_next = items.len() > limit;
    items.truncate(limit);

    Ok(build_response(items, has_next, false))
}

/// Serve a page from the cached dataset, hydrating it first on a miss.
async fn page_from_cache(
    pool: &PgPool,
    cache: &RecordCache,
    cursor: i32,
    limit: usize,
) -> anyhow::Result<(Vec<Employee>, bool)> {
    if !cache.is_dataset_cached().await? {
        hydrate_dataset(pool, cache).await?;
    }

    Ok(cache.page_after(cursor, limit).await?)
}

/// Batch size for streaming the employees table into the cache.
const HYDRATION_BATCH: i64 = 1000;

/// Stream the full table into the dataset sorted set in id order, one
/// keyset batch at a time.
async fn hydrate_dataset(pool: &PgPool, cache: &RecordCache) -> anyhow::Result<()> {
    cache.begin_dataset_load().await?;

    let mut last_id = 0i32;
    let mut total = 0usize;
    loop {
        let batch: Vec<Employee> =
            sqlx::query_as("SELECT * FROM employees WHERE id > $1 ORDER BY id LIMIT $2")
                .bind(last_id)
                .bind(HYDRATION_BATCH)
                .fetch_all(pool)
                .await?;

        if let Some(last) = batch.last() {
            last_id = last.id;
        } else {
            break;
        }

        total += batch.len();
        cache.add_dataset_batch(&batch).await?;

        if (batch.len() as i64) < HYDRATION_BATCH {
            break;
        }
    }

    cache.finish_dataset_load().await?;
    tracing::debug!(count = total, "Hydrated record cache");
    Ok(())
}

fn build_response(items: Vec<Employee>, has_next: bool, cached: bool) -> ListEmployeesResponse {
    let next_cursor = if has_next {
        items.last().map(|e| e.id)
    } else {
        None
    };

    ListEmployeesResponse {
        items,
        next_cursor,
        has_next,
        cached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn employee(id: i32) -> Employee {
        Employee {
            id,
            firstname: "Kai".to_string(),
            lastname: "Tan".to_string(),
            gender: "Male".to_string(),
            country: "Singapore".to_string(),
            age: 30,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_numeric_query_params_parse_from_query_string() {
        let query: ListEmployeesQuery =
            serde_urlencoded::from_str("cursor=100&limit=20&age_min=25&age_max=40").unwrap();
        assert_eq!(query.cursor, Some(100));
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.age_min, Some(25));
        assert_eq!(query.age_max, Some(40));
        assert_eq!(query.paging().cursor(), 100);
        assert_eq!(query.paging().limit(), 20);
    }

    #[test]
    fn test_date_filters_parse_from_query_string() {
        let query: ListEmployeesQuery =
            serde_urlencoded::from_str("date_from=2020-01-01&date_to=2021-06-30").unwrap();
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(query.date_to, NaiveDate::from_ymd_opt(2021, 6, 30));
        assert!(query.has_filters());
    }

    #[test]
    fn test_filters_detected() {
        let mut query = ListEmployeesQuery::default();
        assert!(!query.has_filters());
        query.country = Some("Japan".to_string());
        assert!(query.has_filters());

        let mut ranged = ListEmployeesQuery::default();
        ranged.age_min = Some(25);
        assert!(ranged.has_filters());
    }

    #[test]
    fn test_next_cursor_is_last_id_when_more_follow() {
        let response = build_response(vec![employee(5), employee(9)], true, true);
        assert_eq!(response.next_cursor, Some(9));
        assert!(response.has_next);
        assert!(response.cached);
    }

    #[test]
    fn test_no_cursor_on_final_page() {
        let response = build_response(vec![employee(5)], false, false);
        assert_eq!(response.next_cursor, None);
        assert!(!response.has_next);
        assert!(!response.cached);
    }
}
