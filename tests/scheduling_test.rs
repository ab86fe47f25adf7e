mod common;

use std::sync::Arc;

use common::{at, setup};
use groomserver::scheduling::{SchedulingError, UpdateAppointmentRequest};
use groomserver::shared::models::AppointmentStatus;
use uuid::Uuid;

#[tokio::test]
async fn double_booking_reports_the_colliding_interval() {
    let app = setup().await;
    let first = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let err = app
        .appointments
        .create(app.tenant, app.booking(at(10, 30), at(11, 30)))
        .await
        .unwrap_err();
    match err {
        SchedulingError::Conflict(windows) => {
            assert_eq!(windows.len(), 1);
            assert_eq!(windows[0].appointment_id, first.id);
            assert_eq!(windows[0].starts_at, at(10, 0));
            assert_eq!(windows[0].ends_at, at(11, 0));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn touching_intervals_are_both_accepted() {
    let app = setup().await;
    app.appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();
    app.appointments
        .create(app.tenant, app.booking(at(11, 0), at(12, 0)))
        .await
        .unwrap();

    let active = app.store.active_appointments(app.tenant, app.location).await;
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn same_slot_in_other_location_is_free() {
    let app = setup().await;
    let other_location = app.store.seed_location(app.tenant).await;
    app.appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let mut req = app.booking(at(10, 0), at(11, 0));
    req.location_id = other_location;
    app.appointments.create(app.tenant, req).await.unwrap();
}

#[tokio::test]
async fn too_short_appointment_is_rejected() {
    let app = setup().await;
    let err = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(10, 3)))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(msg) if msg.contains("5 minutes")));
}

#[tokio::test]
async fn inverted_interval_is_rejected() {
    let app = setup().await;
    let err = app
        .appointments
        .create(app.tenant, app.booking(at(11, 0), at(10, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[tokio::test]
async fn unknown_customer_is_a_not_found_error() {
    let app = setup().await;
    let mut req = app.booking(at(10, 0), at(11, 0));
    req.customer_id = Uuid::new_v4();
    let err = app.appointments.create(app.tenant, req).await.unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound("customer")));
}

#[tokio::test]
async fn deceased_pet_is_a_not_found_error() {
    let app = setup().await;
    let pet = app.store.seed_pet(app.tenant, false).await;
    let mut req = app.booking(at(10, 0), at(11, 0));
    req.pet_id = Some(pet);
    let err = app.appointments.create(app.tenant, req).await.unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound("pet")));
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
    let app = setup().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&app.appointments);
        let tenant = app.tenant;
        let req = app.booking(at(10, 0), at(11, 0));
        handles.push(tokio::spawn(
            async move { service.create(tenant, req).await },
        ));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(SchedulingError::Conflict(windows)) => assert!(!windows.is_empty()),
            Err(other) => panic!("expected conflict, got {other:?}"),
        }
    }
    assert_eq!(winners, 1);
    let active = app.store.active_appointments(app.tenant, app.location).await;
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn update_keeps_notes_when_absent_and_clears_on_explicit_null() {
    let app = setup().await;
    let mut req = app.booking(at(10, 0), at(11, 0));
    req.notes = Some("shy dog".to_string());
    let appointment = app.appointments.create(app.tenant, req).await.unwrap();

    let kept = app
        .appointments
        .update(
            app.tenant,
            appointment.id,
            UpdateAppointmentRequest {
                starts_at: Some(at(12, 0)),
                ends_at: Some(at(13, 0)),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(kept.notes.as_deref(), Some("shy dog"));

    let cleared = app
        .appointments
        .update(
            app.tenant,
            appointment.id,
            UpdateAppointmentRequest {
                notes: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.notes, None);
}

#[tokio::test]
async fn update_overlap_check_excludes_the_appointment_itself() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    // Shift by 15 minutes; the only "overlap" is with itself.
    let updated = app
        .appointments
        .update(
            app.tenant,
            appointment.id,
            UpdateAppointmentRequest {
                starts_at: Some(at(10, 15)),
                ends_at: Some(at(11, 15)),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.starts_at, at(10, 15));
}

#[tokio::test]
async fn update_into_another_booking_conflicts() {
    let app = setup().await;
    let blocker = app
        .appointments
        .create(app.tenant, app.booking(at(12, 0), at(13, 0)))
        .await
        .unwrap();
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let err = app
        .appointments
        .update(
            app.tenant,
            appointment.id,
            UpdateAppointmentRequest {
                starts_at: Some(at(12, 30)),
                ends_at: Some(at(13, 30)),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    match err {
        SchedulingError::Conflict(windows) => {
            assert_eq!(windows[0].appointment_id, blocker.id);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_slot_frees_the_interval() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();
    app.appointments
        .cancel(app.tenant, appointment.id)
        .await
        .unwrap();

    app.appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancel_is_idempotent_and_keeps_the_first_timestamp() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let first = app
        .appointments
        .cancel(app.tenant, appointment.id)
        .await
        .unwrap();
    let second = app
        .appointments
        .cancel(app.tenant, appointment.id)
        .await
        .unwrap();

    assert_eq!(first.status, AppointmentStatus::Cancelled.as_str());
    assert!(first.cancelled_at.is_some());
    assert_eq!(first.cancelled_at, second.cancelled_at);
}

#[tokio::test]
async fn mark_done_twice_returns_the_same_record_and_one_sync_event() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let first = app
        .appointments
        .mark_done(app.tenant, appointment.id)
        .await
        .unwrap();
    let second = app
        .appointments
        .mark_done(app.tenant, appointment.id)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
    assert_eq!(app.store.sync_events_for(appointment.id).await.len(), 1);
}

#[tokio::test]
async fn mark_done_on_a_cancelled_appointment_always_errors() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();
    app.appointments
        .cancel(app.tenant, appointment.id)
        .await
        .unwrap();

    let err = app
        .appointments
        .mark_done(app.tenant, appointment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
    assert!(app.store.sync_events_for(appointment.id).await.is_empty());
}

#[tokio::test]
async fn no_show_is_idempotent_and_creates_no_sync_event() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let first = app
        .appointments
        .mark_no_show(app.tenant, appointment.id)
        .await
        .unwrap();
    let second = app
        .appointments
        .mark_no_show(app.tenant, appointment.id)
        .await
        .unwrap();
    assert_eq!(first.status, AppointmentStatus::NoShow.as_str());
    assert_eq!(first.status, second.status);
    assert!(app.store.sync_events_for(appointment.id).await.is_empty());

    let err = app
        .appointments
        .mark_done(app.tenant, appointment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let app = setup().await;
    let appointment = app
        .appointments
        .create(app.tenant, app.booking(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    let other_tenant = Uuid::new_v4();
    let err = app
        .appointments
        .get(other_tenant, appointment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound("appointment")));
}
