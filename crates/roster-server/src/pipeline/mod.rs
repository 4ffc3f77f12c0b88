//! Asynchronous spreadsheet upload pipeline
//!
//! An upload flows through three queue topics:
//!
//! 1. `upload-parse-validate` reads the staged file, validates every row,
//!    and fans valid rows out as fixed-size insert chunks.
//! 2. `upload-data-insert` batch-inserts one chunk per job and advances the
//!    upload job's progress counters.
//! 3. `upload-error-logging` persists per-row validation and insertion
//!    errors, prioritised above inserts so failures surface quickly.
//!
//! The stages communicate only through the queue and the `upload_jobs` row,
//! so any number of server processes can run workers against the same
//! database.

pub mod jobs;
pub mod parser;
mod stages;
pub mod store;
pub mod validator;

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::RecordCache;
use crate::queue::{JobQueue, WorkOptions};

pub const TOPIC_PARSE_VALIDATE: &str = "upload-parse-validate";
pub const TOPIC_DATA_INSERT: &str = "upload-data-insert";
pub const TOPIC_ERROR_LOGGING: &str = "upload-error-logging";

/// Rows per insert chunk.
pub const CHUNK_SIZE: usize = 100;

/// Error-logging jobs jump ahead of pending inserts.
pub const ERROR_LOGGING_PRIORITY: i32 = 5;

/// Parsing is sequential: one file at a time keeps memory bounded.
pub const PARSE_VALIDATE_WORKERS: WorkOptions = WorkOptions {
    team_size: 1,
    concurrency: 1,
};

/// Inserts parallelise well, chunks are independent.
pub const DATA_INSERT_WORKERS: WorkOptions = WorkOptions {
    team_size: 5,
    concurrency: 5,
};

pub const ERROR_LOGGING_WORKERS: WorkOptions = WorkOptions {
    team_size: 1,
    concurrency: 1,
};

/// Registers the three stage workers on a shared queue.
pub struct UploadPipeline {
    pool: PgPool,
    cache: RecordCache,
    queue: Arc<JobQueue>,
}

impl UploadPipeline {
    pub fn new(pool: PgPool, cache: RecordCache, queue: Arc<JobQueue>) -> Self {
        Self { pool, cache, queue }
    }

    /// Start worker pools for all three stages.
    pub fn start(&self) {
        let pool = self.pool.clone();
        let queue = self.queue.clone();
        self.queue
            .work(TOPIC_PARSE_VALIDATE, PARSE_VALIDATE_WORKERS, move |job| {
                let pool = pool.clone();
                let queue = queue.clone();
                async move { stages::parse_validate(pool, queue, job).await }
            });

        let pool = self.pool.clone();
        let cache = self.cache.clone();
        let queue = self.queue.clone();
        self.queue
            .work(TOPIC_DATA_INSERT, DATA_INSERT_WORKERS, move |job| {
                let pool = pool.clone();
                let cache = cache.clone();
                let queue = queue.clone();
                async move { stages::data_insert(pool, cache, queue, job).await }
            });

        let pool = self.pool.clone();
        self.queue
            .work(TOPIC_ERROR_LOGGING, ERROR_LOGGING_WORKERS, move |job| {
                let pool = pool.clone();
                async move { stages::error_logging(pool, job).await }
            });

        tracing::info!("Upload pipeline workers started");
    }
}
