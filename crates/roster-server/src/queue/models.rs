//! Queue configuration and job types

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default delay before the first retry, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

/// Default number of retries before a job is archived as failed.
pub const DEFAULT_RETRY_LIMIT: i32 = 3;

/// Default poll interval for idle workers, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default retention for completed and failed rows, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Active jobs older than this are assumed orphaned and returned to the
/// pending state by the maintenance task.
pub const DEFAULT_STALL_TIMEOUT_SECS: i64 = 900;

/// Errors surfaced by queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Queue behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum retry attempts per job.
    pub retry_limit: i32,
    /// Base delay between retries in seconds.
    pub retry_delay_secs: u64,
    /// Double the delay on each successive retry.
    pub retry_backoff: bool,
    /// How often idle workers poll for new jobs.
    pub poll_interval_ms: u64,
    /// Days to keep completed and failed rows before purging.
    pub retention_days: i64,
    /// Seconds after which an active job is considered orphaned.
    pub stall_timeout_secs: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            retry_backoff: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            retention_days: DEFAULT_RETENTION_DAYS,
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
        }
    }
}

impl QueueConfig {
    /// Load configuration from `QUEUE_*` environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retry_limit: std::env::var("QUEUE_RETRY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_limit),
            retry_delay_secs: std::env::var("QUEUE_RETRY_DELAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_secs),
            retry_backoff: std::env::var("QUEUE_RETRY_BACKOFF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_backoff),
            poll_interval_ms: std::env::var("QUEUE_POLL_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_interval_ms),
            retention_days: std::env::var("QUEUE_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retention_days),
            stall_timeout_secs: std::env::var("QUEUE_STALL_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stall_timeout_secs),
        }
    }

    /// Delay before the next attempt, given how many retries have already
    /// happened. Doubles per retry when backoff is enabled.
    pub fn retry_delay_for(&self, retry_count: i32) -> u64 {
        if self.retry_backoff {
            let exponent = retry_count.clamp(0, 16) as u32;
            self.retry_delay_secs.saturating_mul(1u64 << exponent)
        } else {
            self.retry_delay_secs
        }
    }
}

/// Worker pool sizing for a topic
#[derive(Debug, Clone, Copy)]
pub struct WorkOptions {
    /// Number of independent polling tasks for this topic.
    pub team_size: usize,
    /// Jobs each polling task may claim and run concurrently.
    pub concurrency: usize,
}

impl Default for WorkOptions {
    fn default() -> Self {
        Self {
            team_size: 1,
            concurrency: 1,
        }
    }
}

/// A claimed job handed to a worker callback
#[derive(Debug)]
pub struct ActiveJob<P> {
    pub id: Uuid,
    pub payload: P,
    pub retry_count: i32,
    pub retry_limit: i32,
}

impl<P> ActiveJob<P> {
    /// True when a failure of this attempt will archive the job rather than
    /// schedule another retry.
    pub fn is_final_attempt(&self) -> bool {
        self.retry_count >= self.retry_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_with_backoff() {
        let config = QueueConfig {
            retry_delay_secs: 60,
            retry_backoff: true,
            ..Default::default()
        };
        assert_eq!(config.retry_delay_for(0), 60);
        assert_eq!(config.retry_delay_for(1), 120);
        assert_eq!(config.retry_delay_for(2), 240);
    }

    #[test]
    fn test_retry_delay_constant_without_backoff() {
        let config = QueueConfig {
            retry_delay_secs: 60,
            retry_backoff: false,
            ..Default::default()
        };
        assert_eq!(config.retry_delay_for(0), 60);
        assert_eq!(config.retry_delay_for(5), 60);
    }

    #[test]
    fn test_retry_delay_does_not_overflow() {
        let config = QueueConfig {
            retry_delay_secs: u64::MAX / 2,
            retry_backoff: true,
            ..Default::default()
        };
        assert_eq!(config.retry_delay_for(40), u64::MAX);
    }

    #[test]
    fn test_final_attempt_detection() {
        let job = ActiveJob {
            id: Uuid::nil(),
            payload: (),
            retry_count: 3,
            retry_limit: 3,
        };
        assert!(job.is_final_attempt());

        let fresh = ActiveJob {
            id: Uuid::nil(),
            payload: (),
            retry_count: 0,
            retry_limit: 3,
        };
        assert!(!fresh.is_final_attempt());
    }
}
