//! In-process delayed queue: one timer task per pending job, firing into an
//! mpsc channel that a worker pool consumes. Cancel aborts the timer before
//! it fires; `fail` re-arms the same job id with the policy's backoff delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{FiredJob, JobId, JobOptions, JobQueue, QueueError};

struct QueueState {
    sender: UnboundedSender<FiredJob>,
    receiver: Option<UnboundedReceiver<FiredJob>>,
    pending: HashMap<JobId, JoinHandle<()>>,
}

impl QueueState {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
            pending: HashMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<HashMap<String, QueueState>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the delivery end of a named queue to a worker pool. Each queue
    /// has exactly one consumer.
    pub async fn take_receiver(&self, queue: &str) -> Option<UnboundedReceiver<FiredJob>> {
        let mut queues = self.inner.lock().await;
        queues
            .entry(queue.to_string())
            .or_insert_with(QueueState::new)
            .receiver
            .take()
    }

    async fn arm(&self, queue: &str, job: FiredJob, delay: Duration) {
        let inner = Arc::clone(&self.inner);
        let queue_name = queue.to_string();
        let job_id = job.id.clone();
        let mut queues = self.inner.lock().await;
        let state = queues
            .entry(queue_name.clone())
            .or_insert_with(QueueState::new);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut queues = inner.lock().await;
            if let Some(state) = queues.get_mut(&queue_name) {
                // Entry gone means the job was cancelled while sleeping.
                if state.pending.remove(&job.id).is_some() {
                    let _ = state.sender.send(job);
                }
            }
        });
        state.pending.insert(job_id, handle);
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<JobId, QueueError> {
        let job_id = Uuid::new_v4().to_string();
        let job = FiredJob {
            id: job_id.clone(),
            payload,
            attempt: 1,
            options,
        };
        // Negative delay means "fire now".
        let delay = Duration::from_millis(options.delay_ms.max(0) as u64);
        self.arm(queue, job, delay).await;
        debug!("enqueued job {} on {} (delay {:?})", job_id, queue, delay);
        Ok(job_id)
    }

    async fn cancel(&self, queue: &str, job_id: &str) -> Result<(), QueueError> {
        let mut queues = self.inner.lock().await;
        if let Some(state) = queues.get_mut(queue) {
            if let Some(handle) = state.pending.remove(job_id) {
                handle.abort();
                debug!("cancelled job {} on {}", job_id, queue);
            }
        }
        Ok(())
    }

    async fn ack(&self, queue: &str, job: &FiredJob) -> Result<(), QueueError> {
        debug!("acked job {} on {} (attempt {})", job.id, queue, job.attempt);
        Ok(())
    }

    async fn fail(&self, queue: &str, job: &FiredJob) -> Result<(), QueueError> {
        if job.attempt >= job.options.max_attempts {
            warn!(
                "job {} on {} dropped after {} attempts",
                job.id, queue, job.attempt
            );
            return Ok(());
        }
        let delay = job.options.backoff.delay_after(job.attempt);
        let retry = FiredJob {
            id: job.id.clone(),
            payload: job.payload.clone(),
            attempt: job.attempt + 1,
            options: job.options,
        };
        self.arm(queue, retry, delay).await;
        Ok(())
    }
}
