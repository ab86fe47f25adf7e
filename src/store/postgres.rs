use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use super::{GroomStore, GuardedWrite, StoreError};
use crate::shared::models::{
    Appointment, AppointmentStatus, CustomerContact, ReminderJob, ReminderSettings, ReminderStatus,
    SyncEvent, SyncStatus,
};
use crate::shared::schema::{
    appointments, customers, locations, pets, reminder_jobs, services, sync_events,
    tenant_settings,
};
use crate::shared::utils::DbPool;

#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Diesel is blocking; every call goes through the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("blocking task failed: {e}")))?
    }
}

fn db_err(e: diesel::result::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn load_overlaps(
    conn: &mut PgConnection,
    tenant: Uuid,
    location: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> QueryResult<Vec<Appointment>> {
    // Half-open intersection: [a,b) meets [s,e) iff a < e && b > s.
    let mut query = appointments::table
        .filter(appointments::tenant_id.eq(tenant))
        .filter(appointments::location_id.eq(location))
        .filter(appointments::status.eq(AppointmentStatus::Scheduled.as_str()))
        .filter(appointments::starts_at.lt(end))
        .filter(appointments::ends_at.gt(start))
        .order(appointments::starts_at.asc())
        .into_boxed();
    if let Some(id) = exclude {
        query = query.filter(appointments::id.ne(id));
    }
    query.load(conn)
}

#[async_trait]
impl GroomStore for PostgresStore {
    async fn appointment(&self, tenant: Uuid, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.blocking(move |conn| {
            appointments::table
                .filter(appointments::id.eq(id))
                .filter(appointments::tenant_id.eq(tenant))
                .first(conn)
                .optional()
                .map_err(db_err)
        })
        .await
    }

    async fn insert_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError> {
        self.blocking(move |conn| {
            // Serializable so two concurrent bookings for the same slot cannot
            // both pass the overlap check.
            conn.build_transaction()
                .serializable()
                .run(|conn| {
                    let conflicts = load_overlaps(
                        conn,
                        row.tenant_id,
                        row.location_id,
                        row.starts_at,
                        row.ends_at,
                        None,
                    )?;
                    if conflicts.is_empty() {
                        diesel::insert_into(appointments::table)
                            .values(&row)
                            .execute(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(conflicts)
                })
                .map(|conflicts| {
                    if conflicts.is_empty() {
                        GuardedWrite::Written
                    } else {
                        GuardedWrite::Conflicts(conflicts)
                    }
                })
                .map_err(db_err)
        })
        .await
    }

    async fn update_appointment_guarded(
        &self,
        row: Appointment,
    ) -> Result<GuardedWrite, StoreError> {
        self.blocking(move |conn| {
            conn.build_transaction()
                .serializable()
                .run(|conn| {
                    let present: i64 = appointments::table
                        .filter(appointments::id.eq(row.id))
                        .filter(appointments::tenant_id.eq(row.tenant_id))
                        .count()
                        .get_result(conn)?;
                    if present == 0 {
                        return Ok(GuardedWrite::NotFound);
                    }
                    let conflicts = load_overlaps(
                        conn,
                        row.tenant_id,
                        row.location_id,
                        row.starts_at,
                        row.ends_at,
                        Some(row.id),
                    )?;
                    if !conflicts.is_empty() {
                        return Ok(GuardedWrite::Conflicts(conflicts));
                    }
                    diesel::update(
                        appointments::table
                            .filter(appointments::id.eq(row.id))
                            .filter(appointments::tenant_id.eq(row.tenant_id)),
                    )
                    .set(&row)
                    .execute(conn)?;
                    Ok::<_, diesel::result::Error>(GuardedWrite::Written)
                })
                .map_err(db_err)
        })
        .await
    }

    async fn update_appointment(&self, row: Appointment) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            diesel::update(
                appointments::table
                    .filter(appointments::id.eq(row.id))
                    .filter(appointments::tenant_id.eq(row.tenant_id)),
            )
            .set(&row)
            .execute(conn)
            .map(|count| count > 0)
            .map_err(db_err)
        })
        .await
    }

    async fn customer_contact(
        &self,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<Option<CustomerContact>, StoreError> {
        self.blocking(move |conn| {
            customers::table
                .filter(customers::id.eq(id))
                .filter(customers::tenant_id.eq(tenant))
                .filter(customers::deleted_at.is_null())
                .select((customers::id, customers::full_name, customers::phone))
                .first::<(Uuid, String, Option<String>)>(conn)
                .optional()
                .map(|found| {
                    found.map(|(id, full_name, phone)| CustomerContact {
                        id,
                        full_name,
                        phone,
                    })
                })
                .map_err(db_err)
        })
        .await
    }

    async fn location_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            locations::table
                .filter(locations::id.eq(id))
                .filter(locations::tenant_id.eq(tenant))
                .filter(locations::deleted_at.is_null())
                .count()
                .get_result::<i64>(conn)
                .map(|count| count > 0)
                .map_err(db_err)
        })
        .await
    }

    async fn pet_alive(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            pets::table
                .filter(pets::id.eq(id))
                .filter(pets::tenant_id.eq(tenant))
                .filter(pets::deceased.eq(false))
                .filter(pets::deleted_at.is_null())
                .count()
                .get_result::<i64>(conn)
                .map(|count| count > 0)
                .map_err(db_err)
        })
        .await
    }

    async fn service_exists(&self, tenant: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            services::table
                .filter(services::id.eq(id))
                .filter(services::tenant_id.eq(tenant))
                .filter(services::deleted_at.is_null())
                .count()
                .get_result::<i64>(conn)
                .map(|count| count > 0)
                .map_err(db_err)
        })
        .await
    }

    async fn reminder_settings(&self, tenant: Uuid) -> Result<ReminderSettings, StoreError> {
        self.blocking(move |conn| {
            tenant_settings::table
                .filter(tenant_settings::tenant_id.eq(tenant))
                .select((
                    tenant_settings::reminders_enabled,
                    tenant_settings::reminder_lead_hours,
                ))
                .first::<(bool, Option<i64>)>(conn)
                .optional()
                .map(|found| match found {
                    Some((enabled, lead)) => ReminderSettings {
                        enabled,
                        lead_hours: lead
                            .unwrap_or(crate::shared::models::DEFAULT_REMINDER_LEAD_HOURS),
                    },
                    None => ReminderSettings::default(),
                })
                .map_err(db_err)
        })
        .await
    }

    async fn reminder(&self, id: Uuid) -> Result<Option<ReminderJob>, StoreError> {
        self.blocking(move |conn| {
            reminder_jobs::table
                .filter(reminder_jobs::id.eq(id))
                .first(conn)
                .optional()
                .map_err(db_err)
        })
        .await
    }

    async fn scheduled_reminder(
        &self,
        tenant: Uuid,
        appointment: Uuid,
    ) -> Result<Option<ReminderJob>, StoreError> {
        self.blocking(move |conn| {
            reminder_jobs::table
                .filter(reminder_jobs::tenant_id.eq(tenant))
                .filter(reminder_jobs::appointment_id.eq(appointment))
                .filter(reminder_jobs::status.eq(ReminderStatus::Scheduled.as_str()))
                .order(reminder_jobs::created_at.desc())
                .first(conn)
                .optional()
                .map_err(db_err)
        })
        .await
    }

    async fn insert_reminder(&self, row: ReminderJob) -> Result<(), StoreError> {
        self.blocking(move |conn| {
            diesel::insert_into(reminder_jobs::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(db_err)
        })
        .await
    }

    async fn update_reminder(&self, row: ReminderJob) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            diesel::update(reminder_jobs::table.filter(reminder_jobs::id.eq(row.id)))
                .set(&row)
                .execute(conn)
                .map(|count| count > 0)
                .map_err(db_err)
        })
        .await
    }

    async fn insert_sync_event(&self, row: SyncEvent) -> Result<(), StoreError> {
        self.blocking(move |conn| {
            diesel::insert_into(sync_events::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(db_err)
        })
        .await
    }

    async fn sync_event(&self, id: Uuid) -> Result<Option<SyncEvent>, StoreError> {
        self.blocking(move |conn| {
            sync_events::table
                .filter(sync_events::id.eq(id))
                .first(conn)
                .optional()
                .map_err(db_err)
        })
        .await
    }

    async fn update_sync_event(&self, row: SyncEvent) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            diesel::update(sync_events::table.filter(sync_events::id.eq(row.id)))
                .set(&row)
                .execute(conn)
                .map(|count| count > 0)
                .map_err(db_err)
        })
        .await
    }

    async fn stale_sync_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<SyncEvent>, StoreError> {
        self.blocking(move |conn| {
            sync_events::table
                .filter(sync_events::status.eq_any(vec![
                    SyncStatus::Pending.as_str(),
                    SyncStatus::Error.as_str(),
                ]))
                .filter(sync_events::attempt_count.lt(max_attempts))
                .filter(
                    sync_events::last_attempt_at
                        .is_null()
                        .or(sync_events::last_attempt_at.lt(cutoff)),
                )
                .order(sync_events::created_at.asc())
                .limit(limit)
                .load(conn)
                .map_err(db_err)
        })
        .await
    }
}
