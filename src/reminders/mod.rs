//! Reminder scheduling: one outstanding delayed SMS per appointment.
//!
//! Replacing a reminder is cancel-then-enqueue and deliberately not
//! transactional with the queue; handlers double-check the row status on
//! delivery, so a stale queue item simply no-ops.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::sms::{SmsError, SmsSender};
use crate::queue::{
    BackoffPolicy, FiredJob, JobHandler, JobOptions, JobQueue, QueueError, REMINDER_QUEUE,
};
use crate::shared::models::{ReminderJob, ReminderStatus};
use crate::shared::state::AppState;
use crate::store::{GroomStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("appointment not found")]
    AppointmentNotFound,
    #[error("reminder not found")]
    NotFound,
    #[error("bad job payload: {0}")]
    Payload(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("sms provider error: {0}")]
    Sms(#[from] SmsError),
}

impl IntoResponse for ReminderError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NotFound | Self::AppointmentNotFound => StatusCode::NOT_FOUND,
            Self::Payload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Queue payload for one reminder send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderJobPayload {
    pub reminder_id: Uuid,
    pub appointment_id: Uuid,
    pub tenant_id: Uuid,
    pub to: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct ReminderQueueOptions {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for ReminderQueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 30_000,
        }
    }
}

pub struct ReminderService {
    store: Arc<dyn GroomStore>,
    queue: Arc<dyn JobQueue>,
    sms: Arc<dyn SmsSender>,
    options: ReminderQueueOptions,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn GroomStore>,
        queue: Arc<dyn JobQueue>,
        sms: Arc<dyn SmsSender>,
        options: ReminderQueueOptions,
    ) -> Self {
        Self {
            store,
            queue,
            sms,
            options,
        }
    }

    /// Schedules the single reminder for an appointment, retiring any prior
    /// one first. Returns None when the tenant has reminders disabled or the
    /// customer has no usable address.
    pub async fn schedule(
        &self,
        tenant: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<ReminderJob>, ReminderError> {
        let appointment = self
            .store
            .appointment(tenant, appointment_id)
            .await?
            .ok_or(ReminderError::AppointmentNotFound)?;
        let settings = self.store.reminder_settings(tenant).await?;
        if !settings.enabled {
            debug!("reminders disabled for tenant {}", tenant);
            return Ok(None);
        }
        let contact = self
            .store
            .customer_contact(tenant, appointment.customer_id)
            .await?;
        let Some(phone) = contact.as_ref().and_then(|c| c.phone.clone()) else {
            debug!(
                "no usable address for customer {}, skipping reminder",
                appointment.customer_id
            );
            return Ok(None);
        };

        let fire_at = appointment.starts_at - Duration::hours(settings.lead_hours);
        // Negative delay is allowed: a booking made inside the lead window
        // sends its reminder immediately.
        let delay_ms = (fire_at - Utc::now()).num_milliseconds();

        self.retire_existing(tenant, appointment_id).await?;

        let name = contact
            .map(|c| c.full_name)
            .unwrap_or_else(|| "there".to_string());
        let message = format!(
            "Hi {}, a reminder for your grooming appointment on {}.",
            name,
            appointment.starts_at.format("%Y-%m-%d %H:%M UTC")
        );
        let now = Utc::now();
        let mut row = ReminderJob {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            appointment_id,
            fire_at,
            message: message.clone(),
            queue_job_id: None,
            status: ReminderStatus::Scheduled.as_str().to_string(),
            provider_ref: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_reminder(row.clone()).await?;

        let payload = serde_json::to_value(ReminderJobPayload {
            reminder_id: row.id,
            appointment_id,
            tenant_id: tenant,
            to: phone,
            message,
        })
        .map_err(|e| ReminderError::Payload(e.to_string()))?;
        let job_id = self
            .queue
            .enqueue(
                REMINDER_QUEUE,
                payload,
                JobOptions {
                    delay_ms,
                    max_attempts: self.options.max_attempts,
                    backoff: BackoffPolicy::Exponential {
                        base_delay_ms: self.options.backoff_base_ms,
                    },
                },
            )
            .await?;
        row.queue_job_id = Some(job_id);
        row.updated_at = Utc::now();
        self.store.update_reminder(row.clone()).await?;
        info!(
            "scheduled reminder {} for appointment {} at {}",
            row.id, appointment_id, fire_at
        );
        Ok(Some(row))
    }

    pub async fn cancel(&self, tenant: Uuid, appointment_id: Uuid) -> Result<(), ReminderError> {
        self.retire_existing(tenant, appointment_id).await
    }

    pub async fn reschedule(
        &self,
        tenant: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<ReminderJob>, ReminderError> {
        // schedule() retires the previous job itself.
        self.schedule(tenant, appointment_id).await
    }

    /// Delivery callback: terminal status comes from the delivery side, never
    /// from the scheduler. Does not re-trigger scheduling.
    pub async fn mark_delivered(
        &self,
        reminder_id: Uuid,
        status: DeliveryStatus,
        provider_ref: Option<String>,
        error_message: Option<String>,
    ) -> Result<ReminderJob, ReminderError> {
        let mut row = self
            .store
            .reminder(reminder_id)
            .await?
            .ok_or(ReminderError::NotFound)?;
        row.status = match status {
            DeliveryStatus::Sent => ReminderStatus::Sent.as_str().to_string(),
            DeliveryStatus::Error => ReminderStatus::Error.as_str().to_string(),
        };
        row.provider_ref = provider_ref;
        row.error_message = error_message;
        row.updated_at = Utc::now();
        self.store.update_reminder(row.clone()).await?;
        Ok(row)
    }

    /// Worker entry point for the reminder queue.
    pub async fn deliver(&self, job: &FiredJob) -> Result<(), ReminderError> {
        let payload: ReminderJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| ReminderError::Payload(e.to_string()))?;
        let Some(row) = self.store.reminder(payload.reminder_id).await? else {
            warn!("reminder {} vanished, dropping job", payload.reminder_id);
            return Ok(());
        };
        if row.status != ReminderStatus::Scheduled.as_str() {
            // Stale queue item from a reschedule or cancellation.
            debug!(
                "reminder {} is {}, skipping delivery",
                row.id, row.status
            );
            return Ok(());
        }
        match self.sms.send(&payload.to, &payload.message).await {
            Ok(provider_ref) => {
                self.mark_delivered(row.id, DeliveryStatus::Sent, Some(provider_ref), None)
                    .await?;
                Ok(())
            }
            Err(e) => {
                // Keep the row SCHEDULED while the queue still has retries
                // left, so the next attempt is not skipped.
                if job.attempt >= job.options.max_attempts {
                    self.mark_delivered(
                        row.id,
                        DeliveryStatus::Error,
                        None,
                        Some(e.to_string()),
                    )
                    .await?;
                }
                Err(ReminderError::Sms(e))
            }
        }
    }

    async fn retire_existing(
        &self,
        tenant: Uuid,
        appointment_id: Uuid,
    ) -> Result<(), ReminderError> {
        let Some(mut existing) = self.store.scheduled_reminder(tenant, appointment_id).await?
        else {
            return Ok(());
        };
        if let Some(handle) = &existing.queue_job_id {
            // Best-effort: a handle we fail to cancel will no-op on delivery.
            if let Err(e) = self.queue.cancel(REMINDER_QUEUE, handle).await {
                warn!(
                    "could not cancel queue job {} for reminder {}: {}",
                    handle, existing.id, e
                );
            }
        }
        existing.status = ReminderStatus::Cancelled.as_str().to_string();
        existing.updated_at = Utc::now();
        self.store.update_reminder(existing).await?;
        Ok(())
    }
}

pub struct ReminderJobHandler {
    service: Arc<ReminderService>,
}

impl ReminderJobHandler {
    pub fn new(service: Arc<ReminderService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for ReminderJobHandler {
    async fn handle(&self, job: &FiredJob) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.service.deliver(job).await?;
        Ok(())
    }
}

// --- HTTP surface ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCallback {
    pub reminder_id: Uuid,
    pub status: DeliveryStatus,
    pub provider_ref: Option<String>,
    pub error_message: Option<String>,
}

async fn delivery_callback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeliveryCallback>,
) -> Result<Json<ReminderJob>, ReminderError> {
    let row = state
        .reminders
        .mark_delivered(req.reminder_id, req.status, req.provider_ref, req.error_message)
        .await?;
    Ok(Json(row))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new().route("/api/reminders/callback", post(delivery_callback))
}
