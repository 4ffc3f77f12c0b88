//! Durable Postgres-backed job queue
//!
//! Jobs are rows in the `queue_jobs` table. Producers enqueue JSON payloads
//! under a topic; worker pools claim pending rows with `FOR UPDATE SKIP
//! LOCKED` so concurrent pollers never double-process a job. Failed jobs are
//! retried with exponential backoff up to a retry limit, then archived in
//! place as `failed`. A maintenance task purges terminal rows past the
//! retention window and rescues jobs whose worker died mid-flight.

mod client;
mod models;

pub use client::JobQueue;
pub use models::{ActiveJob, QueueConfig, QueueError, WorkOptions};
