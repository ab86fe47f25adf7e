//! Store contract consumed by the scheduling, reminder and sync services.
//!
//! Persistence mechanics beyond these operations live behind this trait;
//! `postgres.rs` is the production implementation, `memory.rs` mirrors its
//! semantics for tests and single-process setups.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::shared::models::{
    Appointment, CustomerContact, ReminderJob, ReminderSettings, SyncEvent,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("connection pool error: {0}")]
    Pool(String),
}

/// Result of a guarded (overlap-checked) appointment write.
#[derive(Debug)]
pub enum GuardedWrite {
    Written,
    NotFound,
    /// The colliding active appointments, ordered by start time.
    Conflicts(Vec<Appointment>),
}

#[async_trait]
pub trait GroomStore: Send + Sync {
    // --- appointments ---

    async fn appointment(&self, tenant: Uuid, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Overlap check + insert as one atomic unit. Returns the conflict set
    /// instead of inserting when the slot is taken.
    async fn insert_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError>;

    /// Overlap check (excluding the row itself) + full-row update as one
    /// atomic unit.
    async fn update_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError>;

    /// Unguarded full-row update; count-affected semantics.
    async fn update_appointment(&self, row: Appointment) -> Result<bool, StoreError>;

    // --- tenant-scoped references ---

    /// None when the customer is missing or soft-deleted.
    async fn customer_contact(
        &self,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<Option<CustomerContact>, StoreError>;

    async fn location_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// False when missing, soft-deleted or deceased.
    async fn pet_alive(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError>;

    async fn service_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError>;

    async fn reminder_settings(&self, tenant: Uuid) -> Result<ReminderSettings, StoreError>;

    // --- reminder jobs ---

    async fn reminder(&self, id: Uuid) -> Result<Option<ReminderJob>, StoreError>;

    async fn scheduled_reminder(
        &self,
        tenant: Uuid,
        appointment: Uuid,
    ) -> Result<Option<ReminderJob>, StoreError>;

    async fn insert_reminder(&self, row: ReminderJob) -> Result<(), StoreError>;

    async fn update_reminder(&self, row: ReminderJob) -> Result<bool, StoreError>;

    // --- sync events ---

    async fn insert_sync_event(&self, row: SyncEvent) -> Result<(), StoreError>;

    async fn sync_event(&self, id: Uuid) -> Result<Option<SyncEvent>, StoreError>;

    async fn update_sync_event(&self, row: SyncEvent) -> Result<bool, StoreError>;

    /// PENDING/ERROR events below the attempt ceiling that were never
    /// attempted or last attempted before `cutoff`, oldest first.
    async fn stale_sync_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<SyncEvent>, StoreError>;
}
