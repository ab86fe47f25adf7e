diesel::table! {
    appointments (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        location_id -> Uuid,
        customer_id -> Uuid,
        pet_id -> Nullable<Uuid>,
        service_id -> Nullable<Uuid>,
        starts_at -> Timestamptz,
        ends_at -> Timestamptz,
        status -> Text,
        cancelled_at -> Nullable<Timestamptz>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reminder_jobs (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        appointment_id -> Uuid,
        fire_at -> Timestamptz,
        message -> Text,
        queue_job_id -> Nullable<Text>,
        status -> Text,
        provider_ref -> Nullable<Text>,
        error_message -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sync_events (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        appointment_id -> Uuid,
        status -> Text,
        payload -> Jsonb,
        attempt_count -> Int4,
        last_attempt_at -> Nullable<Timestamptz>,
        last_error -> Nullable<Text>,
        external_ref -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    customers (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        full_name -> Text,
        phone -> Nullable<Text>,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    pets (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        customer_id -> Uuid,
        name -> Text,
        deceased -> Bool,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    services (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        name -> Text,
        duration_minutes -> Int4,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    locations (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        name -> Text,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    tenant_settings (tenant_id) {
        tenant_id -> Uuid,
        reminders_enabled -> Bool,
        reminder_lead_hours -> Nullable<Int8>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    appointments,
    reminder_jobs,
    sync_events,
    customers,
    pets,
    services,
    locations,
    tenant_settings,
);
