//! Stale-work reaper: periodic sweep that re-enqueues outbox rows stuck in a
//! retryable state. The recovery net for jobs lost to crashes, queue outages
//! or dropped enqueue calls anywhere else in the pipeline.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::interval;
use uuid::Uuid;

use super::{SyncJobPayload, SyncQueueOptions, SYNC_ATTEMPT_CEILING, SYNC_QUEUE};
use crate::queue::JobQueue;
use crate::shared::models::SyncStatus;
use crate::store::GroomStore;

#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    pub period_secs: u64,
    pub cooldown_secs: i64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            period_secs: 60,
            cooldown_secs: 300,
            batch_size: 50,
            max_attempts: SYNC_ATTEMPT_CEILING,
        }
    }
}

pub struct StaleWorkReaper {
    store: Arc<dyn GroomStore>,
    queue: Arc<dyn JobQueue>,
    queue_options: SyncQueueOptions,
    settings: ReaperSettings,
}

impl StaleWorkReaper {
    pub fn new(
        store: Arc<dyn GroomStore>,
        queue: Arc<dyn JobQueue>,
        queue_options: SyncQueueOptions,
        settings: ReaperSettings,
    ) -> Self {
        Self {
            store,
            queue,
            queue_options,
            settings,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "stale-work reaper started (period {}s, cooldown {}s)",
                self.settings.period_secs, self.settings.cooldown_secs
            );
            let mut ticker = interval(std::time::Duration::from_secs(self.settings.period_secs));
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(0) => {}
                    Ok(n) => info!("reaper re-enqueued {} sync event(s)", n),
                    Err(e) => error!("reaper sweep failed: {}", e),
                }
            }
        })
    }

    /// One sweep: select retryable rows past the cool-down, flip ERROR rows
    /// back to PENDING and re-enqueue them. Per-row failures are logged and
    /// skipped so one bad row never blocks the batch.
    pub async fn sweep(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let cutoff = Utc::now() - Duration::seconds(self.settings.cooldown_secs);
        let events = self
            .store
            .stale_sync_events(cutoff, self.settings.max_attempts, self.settings.batch_size)
            .await?;

        let mut revived = 0usize;
        for mut event in events {
            if event.status == SyncStatus::Error.as_str() {
                event.status = SyncStatus::Pending.as_str().to_string();
                event.updated_at = Utc::now();
                let id = event.id;
                if let Err(e) = self.store.update_sync_event(event).await {
                    warn!("reaper could not reset sync event {}: {}", id, e);
                    continue;
                }
                if let Err(e) = self.enqueue(id).await {
                    warn!("reaper could not enqueue sync event {}: {}", id, e);
                    continue;
                }
            } else if let Err(e) = self.enqueue(event.id).await {
                warn!("reaper could not enqueue sync event {}: {}", event.id, e);
                continue;
            }
            revived += 1;
        }
        Ok(revived)
    }

    async fn enqueue(&self, event_id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_value(SyncJobPayload { event_id })?;
        self.queue
            .enqueue(SYNC_QUEUE, payload, self.queue_options.job_options())
            .await?;
        Ok(())
    }
}
