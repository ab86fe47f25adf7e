//! Worker pools draining the delayed queue: bounded concurrency via a
//! semaphore, per-pool rate limiting via governor. Ordering across jobs is
//! approximately FIFO only.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use log::{error, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::{FiredJob, JobQueue};

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &FiredJob) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn(
        name: &'static str,
        queue_name: &'static str,
        mut receiver: UnboundedReceiver<FiredJob>,
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        rate_per_sec: u32,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "{} worker pool started (concurrency {}, {}/s)",
                name, concurrency, rate_per_sec
            );
            let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
            let quota = Quota::per_second(NonZeroU32::new(rate_per_sec).unwrap_or(NonZeroU32::MIN));
            let limiter = Arc::new(RateLimiter::direct(quota));

            while let Some(job) = receiver.recv().await {
                limiter.until_ready().await;
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let queue = Arc::clone(&queue);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let _permit = permit;
                    match handler.handle(&job).await {
                        Ok(()) => {
                            if let Err(e) = queue.ack(queue_name, &job).await {
                                warn!("{}: ack failed for job {}: {}", name, job.id, e);
                            }
                        }
                        Err(e) => {
                            warn!(
                                "{}: job {} attempt {} failed: {}",
                                name, job.id, job.attempt, e
                            );
                            if let Err(e) = queue.fail(queue_name, &job).await {
                                error!("{}: could not re-arm job {}: {}", name, job.id, e);
                            }
                        }
                    }
                });
            }
            info!("{} worker pool stopped", name);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{BackoffPolicy, JobOptions, JobQueue, MemoryQueue};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyHandler {
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(
            &self,
            _job: &FiredJob,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err("transient".into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn pool_retries_failed_jobs_until_success() {
        let queue = MemoryQueue::new();
        let receiver = queue.take_receiver("test").await.unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let handler = Arc::new(FlakyHandler {
            calls: Arc::clone(&calls),
            fail_first: 2,
        });
        WorkerPool::spawn(
            "test",
            "test",
            receiver,
            Arc::new(queue.clone()),
            handler,
            2,
            100,
        );
        queue
            .enqueue(
                "test",
                json!({}),
                JobOptions {
                    delay_ms: 0,
                    max_attempts: 5,
                    backoff: BackoffPolicy::Exponential { base_delay_ms: 5 },
                },
            )
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while calls.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job should be retried to success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
