use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed appointment status set. SCHEDULED is the only status that
/// participates in overlap checks; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Done,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Cancelled => "CANCELLED",
            Self::Done => "DONE",
            Self::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(Self::Scheduled),
            "CANCELLED" => Some(Self::Cancelled),
            "DONE" => Some(Self::Done),
            "NO_SHOW" => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Scheduled,
    Cancelled,
    Sent,
    Error,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Cancelled => "CANCELLED",
            Self::Sent => "SENT",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(Self::Scheduled),
            "CANCELLED" => Some(Self::Cancelled),
            "SENT" => Some(Self::Sent),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

// Database model - matches schema exactly
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Insertable, Identifiable, AsChangeset,
)]
#[diesel(table_name = crate::shared::schema::appointments)]
#[diesel(treat_none_as_null = true)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status(&self) -> Option<AppointmentStatus> {
        AppointmentStatus::parse(&self.status)
    }
}

/// One outstanding delayed-send intent per appointment. At most one row per
/// appointment may be in SCHEDULED status at any time.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Insertable, Identifiable, AsChangeset,
)]
#[diesel(table_name = crate::shared::schema::reminder_jobs)]
#[diesel(treat_none_as_null = true)]
pub struct ReminderJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub appointment_id: Uuid,
    pub fire_at: DateTime<Utc>,
    pub message: String,
    pub queue_job_id: Option<String>,
    pub status: String,
    pub provider_ref: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outbox row: a durable "sync this appointment to the accounting ledger"
/// intent with an immutable payload snapshot taken at creation time.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Insertable, Identifiable, AsChangeset,
)]
#[diesel(table_name = crate::shared::schema::sync_events)]
#[diesel(treat_none_as_null = true)]
pub struct SyncEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub appointment_id: Uuid,
    pub status: String,
    pub payload: serde_json::Value,
    pub attempt_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer contact details as this subsystem sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Per-tenant reminder configuration, externally managed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub enabled: bool,
    pub lead_hours: i64,
}

pub const DEFAULT_REMINDER_LEAD_HOURS: i64 = 24;

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_hours: DEFAULT_REMINDER_LEAD_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_status_round_trips() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Done,
            AppointmentStatus::NoShow,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("RESCHEDULED"), None);
    }

    #[test]
    fn only_scheduled_is_active() {
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::Done.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
    }
}
