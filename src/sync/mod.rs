//! External-sync outbox: one durable row per "push this appointment to the
//! accounting ledger" intent, processed by the sync worker and recovered by
//! the stale-work reaper.

pub mod reaper;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{LedgerClient, LedgerError};
use crate::queue::{
    BackoffPolicy, FiredJob, JobHandler, JobOptions, JobQueue, QueueError, SYNC_QUEUE,
};
use crate::shared::models::{Appointment, SyncEvent, SyncStatus};
use crate::shared::state::AppState;
use crate::store::{GroomStore, StoreError};

pub use reaper::{ReaperSettings, StaleWorkReaper};

/// Events at or above this attempt count are excluded from automatic retry;
/// an operator can still reprocess them by hand.
pub const SYNC_ATTEMPT_CEILING: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync event not found")]
    NotFound,
    #[error("bad job payload: {0}")]
    Payload(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for SyncError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Payload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobPayload {
    pub event_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncQueueOptions {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for SyncQueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 60_000,
        }
    }
}

impl SyncQueueOptions {
    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            delay_ms: 0,
            max_attempts: self.max_attempts,
            backoff: BackoffPolicy::Exponential {
                base_delay_ms: self.backoff_base_ms,
            },
        }
    }
}

pub struct SyncService {
    store: Arc<dyn GroomStore>,
    queue: Arc<dyn JobQueue>,
    ledger: Arc<dyn LedgerClient>,
    options: SyncQueueOptions,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn GroomStore>,
        queue: Arc<dyn JobQueue>,
        ledger: Arc<dyn LedgerClient>,
        options: SyncQueueOptions,
    ) -> Self {
        Self {
            store,
            queue,
            ledger,
            options,
        }
    }

    /// Writes the outbox row, then enqueues delivery. The row write is the
    /// durable part: if the enqueue fails the reaper will pick the row up.
    pub async fn create_for(&self, appointment: &Appointment) -> Result<SyncEvent, SyncError> {
        let payload = serde_json::to_value(appointment)
            .map_err(|e| SyncError::Payload(e.to_string()))?;
        let now = Utc::now();
        let row = SyncEvent {
            id: Uuid::new_v4(),
            tenant_id: appointment.tenant_id,
            appointment_id: appointment.id,
            status: SyncStatus::Pending.as_str().to_string(),
            payload,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
            external_ref: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_sync_event(row.clone()).await?;

        let job = serde_json::to_value(SyncJobPayload { event_id: row.id })
            .map_err(|e| SyncError::Payload(e.to_string()))?;
        if let Err(e) = self
            .queue
            .enqueue(SYNC_QUEUE, job, self.options.job_options())
            .await
        {
            warn!(
                "sync event {} created but enqueue failed ({}); reaper will recover it",
                row.id, e
            );
        }
        Ok(row)
    }

    /// Processes one outbox row. Anything other than PENDING is a no-op;
    /// that is the guard against duplicate delivery from at-least-once
    /// queues. The attempt is counted here, at processing time.
    pub async fn process_event(&self, event_id: Uuid) -> Result<(), SyncError> {
        let Some(mut event) = self.store.sync_event(event_id).await? else {
            warn!("sync event {} vanished, dropping job", event_id);
            return Ok(());
        };
        if event.status != SyncStatus::Pending.as_str() {
            debug!(
                "sync event {} is {}, skipping duplicate delivery",
                event.id, event.status
            );
            return Ok(());
        }
        event.attempt_count += 1;
        event.last_attempt_at = Some(Utc::now());

        match self.ledger.sync_appointment(&event.payload).await {
            Ok(external_ref) => {
                event.status = SyncStatus::Success.as_str().to_string();
                event.external_ref = Some(external_ref);
                event.last_error = None;
                event.updated_at = Utc::now();
                self.store.update_sync_event(event.clone()).await?;
                info!(
                    "sync event {} delivered (attempt {})",
                    event.id, event.attempt_count
                );
                Ok(())
            }
            Err(e) => {
                event.status = SyncStatus::Error.as_str().to_string();
                event.last_error = Some(e.to_string());
                event.updated_at = Utc::now();
                self.store.update_sync_event(event).await?;
                // Re-raise so the queue counts the attempt.
                Err(SyncError::Ledger(e))
            }
        }
    }

    /// Administrative retry: force PENDING and process inline. Bypasses the
    /// reaper's attempt ceiling on purpose; an operator asked for it.
    pub async fn reprocess(&self, event_id: Uuid) -> Result<SyncEvent, SyncError> {
        let mut event = self
            .store
            .sync_event(event_id)
            .await?
            .ok_or(SyncError::NotFound)?;
        event.status = SyncStatus::Pending.as_str().to_string();
        event.updated_at = Utc::now();
        self.store.update_sync_event(event).await?;

        if let Err(e) = self.process_event(event_id).await {
            warn!("manual reprocess of sync event {} failed: {}", event_id, e);
        }
        self.store
            .sync_event(event_id)
            .await?
            .ok_or(SyncError::NotFound)
    }
}

pub struct SyncJobHandler {
    service: Arc<SyncService>,
}

impl SyncJobHandler {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for SyncJobHandler {
    async fn handle(&self, job: &FiredJob) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload: SyncJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| SyncError::Payload(e.to_string()))?;
        self.service.process_event(payload.event_id).await?;
        Ok(())
    }
}

// --- HTTP surface ---

async fn reprocess_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SyncEvent>, SyncError> {
    Ok(Json(state.sync.reprocess(id).await?))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/sync-events/:id/reprocess", post(reprocess_event))
}
