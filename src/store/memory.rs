//! In-memory `GroomStore` with the same filter and ordering semantics as the
//! postgres implementation. Used by tests and single-process setups; the
//! guarded writes are atomic under one write lock.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{GroomStore, GuardedWrite, StoreError};
use crate::shared::models::{
    Appointment, AppointmentStatus, CustomerContact, ReminderJob, ReminderSettings,
    ReminderStatus, SyncEvent, SyncStatus,
};

#[derive(Default)]
struct Inner {
    appointments: HashMap<Uuid, Appointment>,
    reminders: HashMap<Uuid, ReminderJob>,
    sync_events: HashMap<Uuid, SyncEvent>,
    customers: HashMap<(Uuid, Uuid), CustomerContact>,
    locations: HashSet<(Uuid, Uuid)>,
    pets: HashMap<(Uuid, Uuid), bool>,
    services: HashSet<(Uuid, Uuid)>,
    settings: HashMap<Uuid, ReminderSettings>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding, used by tests to stand in for the CRUD side of the app ---

    pub async fn seed_customer(&self, tenant: Uuid, name: &str, phone: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.customers.insert(
            (tenant, id),
            CustomerContact {
                id,
                full_name: name.to_string(),
                phone: phone.map(String::from),
            },
        );
        id
    }

    pub async fn seed_location(&self, tenant: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.locations.insert((tenant, id));
        id
    }

    pub async fn seed_pet(&self, tenant: Uuid, alive: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.pets.insert((tenant, id), alive);
        id
    }

    pub async fn seed_service(&self, tenant: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.services.insert((tenant, id));
        id
    }

    pub async fn set_reminder_settings(&self, tenant: Uuid, settings: ReminderSettings) {
        self.inner.write().await.settings.insert(tenant, settings);
    }

    // --- inspection helpers for tests ---

    pub async fn reminders_for(&self, appointment: Uuid) -> Vec<ReminderJob> {
        let inner = self.inner.read().await;
        let mut rows: Vec<ReminderJob> = inner
            .reminders
            .values()
            .filter(|r| r.appointment_id == appointment)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows
    }

    pub async fn sync_events_for(&self, appointment: Uuid) -> Vec<SyncEvent> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SyncEvent> = inner
            .sync_events
            .values()
            .filter(|e| e.appointment_id == appointment)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.created_at);
        rows
    }

    pub async fn active_appointments(&self, tenant: Uuid, location: Uuid) -> Vec<Appointment> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| {
                a.tenant_id == tenant
                    && a.location_id == location
                    && a.status == AppointmentStatus::Scheduled.as_str()
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.starts_at);
        rows
    }
}

fn overlaps_of(
    inner: &Inner,
    tenant: Uuid,
    location: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Vec<Appointment> {
    let mut rows: Vec<Appointment> = inner
        .appointments
        .values()
        .filter(|a| {
            a.tenant_id == tenant
                && a.location_id == location
                && a.status == AppointmentStatus::Scheduled.as_str()
                && a.starts_at < end
                && a.ends_at > start
                && Some(a.id) != exclude
        })
        .cloned()
        .collect();
    rows.sort_by_key(|a| a.starts_at);
    rows
}

#[async_trait]
impl GroomStore for MemoryStore {
    async fn appointment(&self, tenant: Uuid, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .appointments
            .get(&id)
            .filter(|a| a.tenant_id == tenant)
            .cloned())
    }

    async fn insert_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError> {
        let mut inner = self.inner.write().await;
        let conflicts = overlaps_of(
            &inner,
            row.tenant_id,
            row.location_id,
            row.starts_at,
            row.ends_at,
            None,
        );
        if !conflicts.is_empty() {
            return Ok(GuardedWrite::Conflicts(conflicts));
        }
        inner.appointments.insert(row.id, row);
        Ok(GuardedWrite::Written)
    }

    async fn update_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.appointments.get(&row.id) {
            Some(existing) if existing.tenant_id == row.tenant_id => {}
            _ => return Ok(GuardedWrite::NotFound),
        }
        let conflicts = overlaps_of(
            &inner,
            row.tenant_id,
            row.location_id,
            row.starts_at,
            row.ends_at,
            Some(row.id),
        );
        if !conflicts.is_empty() {
            return Ok(GuardedWrite::Conflicts(conflicts));
        }
        inner.appointments.insert(row.id, row);
        Ok(GuardedWrite::Written)
    }

    async fn update_appointment(&self, row: Appointment) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.appointments.get(&row.id) {
            Some(existing) if existing.tenant_id == row.tenant_id => {
                inner.appointments.insert(row.id, row);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn customer_contact(
        &self,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<Option<CustomerContact>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.customers.get(&(tenant, id)).cloned())
    }

    async fn location_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.locations.contains(&(tenant, id)))
    }

    async fn pet_alive(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .pets
            .get(&(tenant, id))
            .copied()
            .unwrap_or(false))
    }

    async fn service_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.services.contains(&(tenant, id)))
    }

    async fn reminder_settings(&self, tenant: Uuid) -> Result<ReminderSettings, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .settings
            .get(&tenant)
            .copied()
            .unwrap_or_default())
    }

    async fn reminder(&self, id: Uuid) -> Result<Option<ReminderJob>, StoreError> {
        Ok(self.inner.read().await.reminders.get(&id).cloned())
    }

    async fn scheduled_reminder(
        &self,
        tenant: Uuid,
        appointment: Uuid,
    ) -> Result<Option<ReminderJob>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&ReminderJob> = inner
            .reminders
            .values()
            .filter(|r| {
                r.tenant_id == tenant
                    && r.appointment_id == appointment
                    && r.status == ReminderStatus::Scheduled.as_str()
            })
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows.last().map(|r| (*r).clone()))
    }

    async fn insert_reminder(&self, row: ReminderJob) -> Result<(), StoreError> {
        self.inner.write().await.reminders.insert(row.id, row);
        Ok(())
    }

    async fn update_reminder(&self, row: ReminderJob) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.reminders.contains_key(&row.id) {
            inner.reminders.insert(row.id, row);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn insert_sync_event(&self, row: SyncEvent) -> Result<(), StoreError> {
        self.inner.write().await.sync_events.insert(row.id, row);
        Ok(())
    }

    async fn sync_event(&self, id: Uuid) -> Result<Option<SyncEvent>, StoreError> {
        Ok(self.inner.read().await.sync_events.get(&id).cloned())
    }

    async fn update_sync_event(&self, row: SyncEvent) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.sync_events.contains_key(&row.id) {
            inner.sync_events.insert(row.id, row);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn stale_sync_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<SyncEvent>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SyncEvent> = inner
            .sync_events
            .values()
            .filter(|e| {
                matches!(
                    SyncStatus::parse(&e.status),
                    Some(SyncStatus::Pending) | Some(SyncStatus::Error)
                ) && e.attempt_count < max_attempts
                    && e.last_attempt_at.map_or(true, |at| at < cutoff)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
