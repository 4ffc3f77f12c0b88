//! Queue client: enqueue, worker pools, and maintenance

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::models::{ActiveJob, QueueConfig, QueueResult, WorkOptions};

/// How often the maintenance task runs.
const MAINTENANCE_INTERVAL_SECS: u64 = 60;

/// Row shape returned by the claim query.
#[derive(Debug, sqlx::FromRow)]
struct ClaimedRow {
    id: Uuid,
    payload: serde_json::Value,
    retry_count: i32,
    retry_limit: i32,
}

/// Postgres-backed job queue with per-topic worker pools.
pub struct JobQueue {
    pool: PgPool,
    config: QueueConfig,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(pool: PgPool, config: QueueConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            pool,
            config,
            shutdown,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a job at default priority.
    pub async fn send<P: Serialize>(&self, topic: &str, payload: &P) -> QueueResult<Uuid> {
        self.send_with_priority(topic, payload, 0).await
    }

    /// Enqueue a job. Higher priority jobs are claimed first within a topic.
    #[tracing::instrument(skip(self, payload))]
    pub async fn send_with_priority<P: Serialize>(
        &self,
        topic: &str,
        payload: &P,
        priority: i32,
    ) -> QueueResult<Uuid> {
        let payload = serde_json::to_value(payload)?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO queue_jobs (topic, payload, priority, retry_limit)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(topic)
        .bind(&payload)
        .bind(priority)
        .bind(self.config.retry_limit)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(job_id = %id, topic, priority, "Job enqueued");

        Ok(id)
    }

    /// Start a worker pool for a topic.
    ///
    /// Spawns `team_size` polling tasks; each claims up to `concurrency`
    /// pending jobs per poll and runs the handler on them concurrently. The
    /// handler returning `Err` schedules a retry until the job's retry limit
    /// is reached, after which the job is archived as failed.
    pub fn work<P, F, Fut>(&self, topic: &str, options: WorkOptions, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(ActiveJob<P>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut workers = match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for worker_id in 0..options.team_size.max(1) {
            let pool = self.pool.clone();
            let config = self.config.clone();
            let topic = topic.to_string();
            let handler = handler.clone();
            let mut shutdown = self.shutdown.subscribe();
            let concurrency = options.concurrency.max(1);

            workers.push(tokio::spawn(async move {
                tracing::info!(topic, worker_id, "Queue worker started");

                loop {
                    if *shutdown.borrow() {
                        break;
                    }

                    let batch =
                        match Self::claim_batch(&pool, &topic, concurrency as i64).await {
                            Ok(batch) => batch,
                            Err(e) => {
                                tracing::error!(topic, error = %e, "Failed to claim jobs");
                                Vec::new()
                            },
                        };

                    if batch.is_empty() {
                        let poll = Duration::from_millis(config.poll_interval_ms);
                        tokio::select! {
                            _ = shutdown.changed() => {},
                            _ = tokio::time::sleep(poll) => {},
                        }
                        continue;
                    }

                    futures::stream::iter(batch)
                        .for_each_concurrent(concurrency, |row| {
                            let pool = pool.clone();
                            let config = config.clone();
                            let topic = topic.clone();
                            let handler = handler.clone();
                            async move {
                                Self::run_job(&pool, &config, &topic, row, handler).await;
                            }
                        })
                        .await;
                }

                tracing::info!(topic, worker_id, "Queue worker stopped");
            }));
        }
    }

    /// Periodically purge terminal rows past retention and return orphaned
    /// active jobs to the queue.
    pub fn spawn_maintenance(&self) {
        let pool = self.pool.clone();
        let config = self.config.clone();
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {},
                }

                if let Err(e) = Self::rescue_stalled(&pool, &config).await {
                    tracing::error!(error = %e, "Queue stall rescue failed");
                }

                if let Err(e) = Self::purge_archived(&pool, &config).await {
                    tracing::error!(error = %e, "Queue retention purge failed");
                }
            }
        });

        match self.workers.lock() {
            Ok(mut guard) => guard.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Stop all workers. Graceful stop lets in-flight jobs finish; otherwise
    /// worker tasks are aborted and orphaned jobs are rescued later by
    /// maintenance on the next startup.
    pub async fn stop(&self, graceful: bool) {
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.drain(..).collect()
        };

        for handle in handles {
            if graceful {
                let _ = handle.await;
            } else {
                handle.abort();
            }
        }

        tracing::info!(graceful, "Queue stopped");
    }

    async fn claim_batch(
        pool: &PgPool,
        topic: &str,
        limit: i64,
    ) -> QueueResult<Vec<ClaimedRow>> {
        let rows: Vec<ClaimedRow> = sqlx::query_as(
            r#"
            UPDATE queue_jobs
            SET state = 'active', started_at = now()
            WHERE id IN (
                SELECT id FROM queue_jobs
                WHERE topic = $1 AND state = 'pending' AND scheduled_at <= now()
                ORDER BY priority DESC, scheduled_at, created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, retry_count, retry_limit
            "#,
        )
        .bind(topic)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn run_job<P, F, Fut>(
        pool: &PgPool,
        config: &QueueConfig,
        topic: &str,
        row: ClaimedRow,
        handler: F,
    ) where
        P: DeserializeOwned + Send + 'static,
        F: Fn(ActiveJob<P>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let job_id = row.id;
        let retry_count = row.retry_count;
        let retry_limit = row.retry_limit;

        let payload: P = match serde_json::from_value(row.payload) {
            Ok(payload) => payload,
            Err(e) => {
                // Malformed payloads can never succeed, archive immediately
                tracing::error!(job_id = %job_id, topic, error = %e, "Unreadable job payload");
                let message = format!("payload deserialization failed: {}", e);
                if let Err(e) = Self::archive_failed(pool, job_id, &message).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to archive job");
                }
                return;
            },
        };

        let job = ActiveJob {
            id: job_id,
            payload,
            retry_count,
            retry_limit,
        };

        tracing::debug!(job_id = %job_id, topic, retry_count, "Job started");

        match handler(job).await {
            Ok(()) => {
                if let Err(e) = Self::mark_completed(pool, job_id).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to complete job");
                } else {
                    tracing::debug!(job_id = %job_id, topic, "Job completed");
                }
            },
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::warn!(
                    job_id = %job_id,
                    topic,
                    retry_count,
                    retry_limit,
                    error = %message,
                    "Job failed"
                );

                let result = if retry_count < retry_limit {
                    Self::schedule_retry(pool, config, job_id, retry_count, &message).await
                } else {
                    Self::archive_failed(pool, job_id, &message).await
                };

                if let Err(e) = result {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job failure");
                }
            },
        }
    }

    async fn mark_completed(pool: &PgPool, id: Uuid) -> QueueResult<()> {
        sqlx::query(
            "UPDATE queue_jobs SET state = 'completed', finished_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn schedule_retry(
        pool: &PgPool,
        config: &QueueConfig,
        id: Uuid,
        retry_count: i32,
        error: &str,
    ) -> QueueResult<()> {
        let delay_secs = config.retry_delay_for(retry_count) as f64;

        sqlx::query(
            r#"
            UPDATE queue_jobs
            SET state = 'pending',
                retry_count = retry_count + 1,
                last_error = $2,
                scheduled_at = now() + make_interval(secs => $3)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(delay_secs)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn archive_failed(pool: &PgPool, id: Uuid, error: &str) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE queue_jobs
            SET state = 'failed', finished_at = now(), last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn rescue_stalled(pool: &PgPool, config: &QueueConfig) -> QueueResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE queue_jobs
            SET state = CASE WHEN retry_count < retry_limit THEN 'pending' ELSE 'failed' END,
                retry_count = retry_count + 1,
                finished_at = CASE WHEN retry_count < retry_limit THEN NULL ELSE now() END,
                scheduled_at = now(),
                last_error = 'worker stalled or crashed'
            WHERE state = 'active'
              AND started_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(config.stall_timeout_secs as f64)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(count = result.rows_affected(), "Rescued stalled queue jobs");
        }

        Ok(())
    }

    async fn purge_archived(pool: &PgPool, config: &QueueConfig) -> QueueResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM queue_jobs
            WHERE state IN ('completed', 'failed')
              AND finished_at < now() - make_interval(days => $1)
            "#,
        )
        .bind(config.retention_days as i32)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(count = result.rows_affected(), "Purged archived queue jobs");
        }

        Ok(())
    }
}
