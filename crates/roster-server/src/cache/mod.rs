//! Redis-backed record cache for cursor pagination
//!
//! The full unfiltered employee dataset lives in one sorted set keyed by
//! record id, so a cursor page is a single `ZRANGEBYSCORE` from `cursor + 1`.
//! Dashboard aggregates and the country list are cached as plain string
//! values with their own TTLs. Every cache path degrades to the database:
//! callers treat errors and misses identically.

mod compress;

pub use compress::{compress, decompress};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

use crate::models::Employee;

/// Sorted set holding the full unfiltered dataset.
pub const DATASET_KEY: &str = "records:search:dataset";

/// Pattern matching every record-search key, used for full invalidation.
pub const SEARCH_KEY_PATTERN: &str = "records:search:*";

/// Cached dashboard aggregates.
pub const DASHBOARD_STATS_KEY: &str = "dashboard:stats";

/// Cached distinct country list.
pub const COUNTRIES_KEY: &str = "countries:list";

/// Dataset TTL: 30 minutes.
pub const DATASET_TTL_SECS: i64 = 1800;

/// Dashboard stats TTL: 5 minutes.
pub const DASHBOARD_TTL_SECS: u64 = 300;

/// Country list TTL: 1 hour.
pub const COUNTRIES_TTL_SECS: u64 = 3600;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cached record encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// What to drop when the underlying data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Drop every record-search key. Used after bulk writes.
    Full,
    /// Drop only the full-dataset sorted set.
    Dataset,
    /// Remove a single record from the dataset without dropping the rest.
    Record(i32),
}

/// Handle to the Redis record cache. Cheap to clone.
#[derive(Clone)]
pub struct RecordCache {
    conn: ConnectionManager,
}

impl RecordCache {
    /// Connect to Redis. The connection manager reconnects on its own after
    /// transient failures.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("Record cache connected");
        Ok(Self { conn })
    }

    /// Round-trip a PING, used by the health endpoint.
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// True when the full dataset sorted set is present.
    pub async fn is_dataset_cached(&self) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(DATASET_KEY).await?;
        Ok(exists)
    }

    /// Start a dataset rebuild by dropping any stale sorted set. Batches are
    /// then loaded with [`add_dataset_batch`](Self::add_dataset_batch) and
    /// the TTL is applied by [`finish_dataset_load`](Self::finish_dataset_load)
    /// once the full table has been streamed in.
    pub async fn begin_dataset_load(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(DATASET_KEY).await?;
        Ok(())
    }

    /// Add one batch of records to the dataset sorted set. Members are
    /// scored by record id so cursor reads are range scans.
    #[tracing::instrument(skip(self, employees), fields(count = employees.len()))]
    pub async fn add_dataset_batch(&self, employees: &[Employee]) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for employee in employees {
            let member = compress(employee)?;
            pipe.zadd(DATASET_KEY, member, employee.id).ignore();
        }

        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Apply the dataset TTL. Called only after the last batch has loaded.
    pub async fn finish_dataset_load(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(DATASET_KEY, DATASET_TTL_SECS).await?;
        Ok(())
    }

    /// Fetch one cursor page from the cached dataset.
    ///
    /// Returns the page plus a flag for whether more records follow. One
    /// extra member is fetched to decide the flag without a second round
    /// trip.
    pub async fn page_after(
        &self,
        cursor: i32,
        limit: usize,
    ) -> CacheResult<(Vec<Employee>, bool)> {
        let mut conn = self.conn.clone();

        let min = i64::from(cursor) + 1;
        let members: Vec<String> = conn
            .zrangebyscore_limit(DATASET_KEY, min, "+inf", 0, (limit + 1) as isize)
            .await?;

        let has_next = members.len() > limit;
        let mut employees = Vec::with_capacity(members.len().min(limit));
        for member in members.into_iter().take(limit) {
            employees.push(decompress(&member)?);
        }

        Ok((employees, has_next))
    }

    /// Drop cached data according to scope.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, scope: InvalidationScope) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        match scope {
            InvalidationScope::Full => {
                let keys: Vec<String> = conn.keys(SEARCH_KEY_PATTERN).await?;
                if !keys.is_empty() {
                    let count = keys.len();
                    let _: () = conn.del(keys).await?;
                    tracing::debug!(count, "Record search cache fully invalidated");
                }
            },
            InvalidationScope::Dataset => {
                let _: () = conn.del(DATASET_KEY).await?;
                tracing::debug!("Dataset cache invalidated");
            },
            InvalidationScope::Record(id) => {
                let removed: usize = conn
                    .zrembyscore(DATASET_KEY, i64::from(id), i64::from(id))
                    .await?;
                tracing::debug!(record_id = id, removed, "Record evicted from dataset cache");
            },
        }

        Ok(())
    }

    /// Drop cached aggregates. Called when the underlying dataset changes
    /// shape, since both stats and the country list derive from it.
    pub async fn invalidate_aggregates(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(&[DASHBOARD_STATS_KEY, COUNTRIES_KEY][..]).await?;
        Ok(())
    }

    /// Cached dashboard aggregates, if fresh.
    pub async fn get_dashboard_stats(&self) -> CacheResult<Option<serde_json::Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(DASHBOARD_STATS_KEY).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_dashboard_stats(&self, stats: &serde_json::Value) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(stats)?;
        let _: () = conn.set_ex(DASHBOARD_STATS_KEY, raw, DASHBOARD_TTL_SECS).await?;
        Ok(())
    }

    /// Cached distinct country list, if fresh.
    pub async fn get_countries(&self) -> CacheResult<Option<Vec<String>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(COUNTRIES_KEY).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_countries(&self, countries: &[String]) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(countries)?;
        let _: () = conn.set_ex(COUNTRIES_KEY, raw, COUNTRIES_TTL_SECS).await?;
        Ok(())
    }
}
