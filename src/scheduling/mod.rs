//! Appointment lifecycle: booking validation, conflict detection, idempotent
//! status transitions, and the best-effort side-effect triggers (reminders,
//! ledger sync).

pub mod conflict;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reminders::ReminderService;
use crate::shared::models::{Appointment, AppointmentStatus};
use crate::shared::state::AppState;
use crate::shared::utils::tenant_from_headers;
use crate::store::{GroomStore, GuardedWrite, StoreError};
use crate::sync::SyncService;
use conflict::{conflict_windows, ConflictWindow};
use state::{transition, LifecycleAction, Transition};

pub const MIN_DURATION_MINUTES: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("time slot conflicts with {} existing appointment(s)", .0.len())]
    Conflict(Vec<ConflictWindow>),
    #[error("database error: {0}")]
    Database(#[from] StoreError),
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            Self::NotFound(_) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": self.to_string() }),
            ),
            Self::Conflict(windows) => (
                StatusCode::CONFLICT,
                serde_json::json!({ "error": self.to_string(), "conflicts": windows }),
            ),
            Self::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "internal error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub location_id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Absent keeps the current notes; an explicit null clears them.
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if start >= end {
        return Err(SchedulingError::Validation(
            "start must be before end".to_string(),
        ));
    }
    if end - start < Duration::minutes(MIN_DURATION_MINUTES) {
        return Err(SchedulingError::Validation(format!(
            "appointment must last at least {} minutes",
            MIN_DURATION_MINUTES
        )));
    }
    Ok(())
}

pub struct AppointmentService {
    store: Arc<dyn GroomStore>,
    reminders: Arc<ReminderService>,
    sync: Arc<SyncService>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn GroomStore>,
        reminders: Arc<ReminderService>,
        sync: Arc<SyncService>,
    ) -> Self {
        Self {
            store,
            reminders,
            sync,
        }
    }

    pub async fn get(&self, tenant: Uuid, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .appointment(tenant, id)
            .await?
            .ok_or(SchedulingError::NotFound("appointment"))
    }

    pub async fn create(
        &self,
        tenant: Uuid,
        req: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        validate_interval(req.starts_at, req.ends_at)?;
        self.check_references(tenant, &req).await?;

        let now = Utc::now();
        let row = Appointment {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            location_id: req.location_id,
            customer_id: req.customer_id,
            pet_id: req.pet_id,
            service_id: req.service_id,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            status: AppointmentStatus::Scheduled.as_str().to_string(),
            cancelled_at: None,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_appointment_guarded(row.clone()).await? {
            GuardedWrite::Written => {}
            GuardedWrite::Conflicts(conflicts) => {
                return Err(SchedulingError::Conflict(conflict_windows(&conflicts)));
            }
            GuardedWrite::NotFound => return Err(SchedulingError::NotFound("appointment")),
        }

        // Best-effort: a failed reminder must not fail the booking.
        if let Err(e) = self.reminders.schedule(tenant, row.id).await {
            warn!("could not schedule reminder for appointment {}: {}", row.id, e);
        }
        Ok(row)
    }

    pub async fn update(
        &self,
        tenant: Uuid,
        id: Uuid,
        req: UpdateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let existing = self.get(tenant, id).await?;

        let time_change = req.starts_at.is_some() || req.ends_at.is_some();
        if time_change && existing.status() != Some(AppointmentStatus::Scheduled) {
            return Err(SchedulingError::Validation(format!(
                "cannot move an appointment in status {}",
                existing.status
            )));
        }

        // Effective interval: any field not supplied keeps its current value.
        let starts_at = req.starts_at.unwrap_or(existing.starts_at);
        let ends_at = req.ends_at.unwrap_or(existing.ends_at);
        validate_interval(starts_at, ends_at)?;

        let start_changed = starts_at != existing.starts_at;
        let row = Appointment {
            starts_at,
            ends_at,
            notes: match req.notes {
                Some(notes) => notes,
                None => existing.notes.clone(),
            },
            updated_at: Utc::now(),
            ..existing
        };

        match self.store.update_appointment_guarded(row.clone()).await? {
            GuardedWrite::Written => {}
            GuardedWrite::NotFound => return Err(SchedulingError::NotFound("appointment")),
            GuardedWrite::Conflicts(conflicts) => {
                return Err(SchedulingError::Conflict(conflict_windows(&conflicts)));
            }
        }

        if start_changed {
            if let Err(e) = self.reminders.reschedule(tenant, row.id).await {
                warn!("could not reschedule reminder for appointment {}: {}", row.id, e);
            }
        }
        Ok(row)
    }

    pub async fn cancel(&self, tenant: Uuid, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get(tenant, id).await?;
        let current = self.parse_status(&appointment)?;
        match transition(current, LifecycleAction::Cancel) {
            Transition::Noop => Ok(appointment),
            Transition::Rejected => Err(self.rejected(current, LifecycleAction::Cancel)),
            Transition::Apply(next) => {
                let row = Appointment {
                    status: next.as_str().to_string(),
                    cancelled_at: Some(Utc::now()),
                    updated_at: Utc::now(),
                    ..appointment
                };
                self.write_row(&row).await?;
                if let Err(e) = self.reminders.cancel(tenant, row.id).await {
                    warn!("could not cancel reminder for appointment {}: {}", row.id, e);
                }
                Ok(row)
            }
        }
    }

    pub async fn mark_done(&self, tenant: Uuid, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get(tenant, id).await?;
        let current = self.parse_status(&appointment)?;
        match transition(current, LifecycleAction::MarkDone) {
            Transition::Noop => Ok(appointment),
            Transition::Rejected => Err(self.rejected(current, LifecycleAction::MarkDone)),
            Transition::Apply(next) => {
                let row = Appointment {
                    status: next.as_str().to_string(),
                    updated_at: Utc::now(),
                    ..appointment
                };
                self.write_row(&row).await?;
                // Best-effort enqueue; the outbox row itself is durable.
                if let Err(e) = self.sync.create_for(&row).await {
                    warn!("could not create sync event for appointment {}: {}", row.id, e);
                }
                Ok(row)
            }
        }
    }

    pub async fn mark_no_show(
        &self,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get(tenant, id).await?;
        let current = self.parse_status(&appointment)?;
        match transition(current, LifecycleAction::MarkNoShow) {
            Transition::Noop => Ok(appointment),
            Transition::Rejected => Err(self.rejected(current, LifecycleAction::MarkNoShow)),
            Transition::Apply(next) => {
                let row = Appointment {
                    status: next.as_str().to_string(),
                    updated_at: Utc::now(),
                    ..appointment
                };
                self.write_row(&row).await?;
                Ok(row)
            }
        }
    }

    async fn check_references(
        &self,
        tenant: Uuid,
        req: &CreateAppointmentRequest,
    ) -> Result<(), SchedulingError> {
        if self
            .store
            .customer_contact(tenant, req.customer_id)
            .await?
            .is_none()
        {
            return Err(SchedulingError::NotFound("customer"));
        }
        if !self.store.location_exists(tenant, req.location_id).await? {
            return Err(SchedulingError::NotFound("location"));
        }
        if let Some(pet) = req.pet_id {
            if !self.store.pet_alive(tenant, pet).await? {
                return Err(SchedulingError::NotFound("pet"));
            }
        }
        if let Some(service) = req.service_id {
            if !self.store.service_exists(tenant, service).await? {
                return Err(SchedulingError::NotFound("service"));
            }
        }
        Ok(())
    }

    fn parse_status(&self, appointment: &Appointment) -> Result<AppointmentStatus, SchedulingError> {
        appointment.status().ok_or_else(|| {
            SchedulingError::Validation(format!("unknown status {}", appointment.status))
        })
    }

    fn rejected(&self, current: AppointmentStatus, action: LifecycleAction) -> SchedulingError {
        SchedulingError::Validation(format!(
            "cannot {} an appointment in status {}",
            action.describe(),
            current.as_str()
        ))
    }

    async fn write_row(&self, row: &Appointment) -> Result<(), SchedulingError> {
        if !self.store.update_appointment(row.clone()).await? {
            return Err(SchedulingError::NotFound("appointment"));
        }
        Ok(())
    }
}

// --- HTTP surface ---

fn require_tenant(headers: &HeaderMap) -> Result<Uuid, SchedulingError> {
    tenant_from_headers(headers).ok_or_else(|| {
        SchedulingError::Validation("missing or invalid X-Tenant-Id header".to_string())
    })
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    let appointment = state.appointments.create(tenant, req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    Ok(Json(state.appointments.get(tenant, id).await?))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    Ok(Json(state.appointments.update(tenant, id, req).await?))
}

async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    Ok(Json(state.appointments.cancel(tenant, id).await?))
}

async fn mark_done(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    Ok(Json(state.appointments.mark_done(tenant, id).await?))
}

async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, SchedulingError> {
    let tenant = require_tenant(&headers)?;
    Ok(Json(state.appointments.mark_no_show(tenant, id).await?))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/appointments", post(create_appointment))
        .route(
            "/api/appointments/:id",
            axum::routing::get(get_appointment).patch(update_appointment),
        )
        .route("/api/appointments/:id/cancel", post(cancel_appointment))
        .route("/api/appointments/:id/done", post(mark_done))
        .route("/api/appointments/:id/no-show", post(mark_no_show))
}
