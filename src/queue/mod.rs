//! Durable delayed job queue contract.
//!
//! Delivery is at-least-once: a job may fire more than once, so every handler
//! double-checks the row it is about to act on. Workers signal failure by
//! returning an error; the queue re-arms the job with backoff until the
//! attempt ceiling.

pub mod memory;
pub mod worker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use memory::MemoryQueue;
pub use worker::{JobHandler, WorkerPool};

pub const REMINDER_QUEUE: &str = "reminders";
pub const SYNC_QUEUE: &str = "sync-events";

pub type JobId = String;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("enqueue failed: {0}")]
    Enqueue(String),
    #[error("cancel failed: {0}")]
    Cancel(String),
    #[error("queue closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffPolicy {
    Exponential { base_delay_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before retrying after `attempt` failed deliveries (attempt >= 1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential { base_delay_ms } => {
                let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
                Duration::from_millis(base_delay_ms.saturating_mul(factor))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobOptions {
    pub delay_ms: i64,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

/// A job as delivered to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredJob {
    pub id: JobId,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub options: JobOptions,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<JobId, QueueError>;

    /// Best-effort: cancelling an already-fired job is a no-op.
    async fn cancel(&self, queue: &str, job_id: &str) -> Result<(), QueueError>;

    async fn ack(&self, queue: &str, job: &FiredJob) -> Result<(), QueueError>;

    /// Re-arms the job with backoff, or drops it once attempts are exhausted.
    async fn fail(&self, queue: &str, job: &FiredJob) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles() {
        let policy = BackoffPolicy::Exponential { base_delay_ms: 500 };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::Exponential {
            base_delay_ms: u64::MAX,
        };
        assert_eq!(policy.delay_after(64), Duration::from_millis(u64::MAX));
    }
}
