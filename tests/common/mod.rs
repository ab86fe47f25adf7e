//! Shared harness: the full service stack over the in-memory store and queue,
//! with recording fakes for the SMS provider and the accounting ledger.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use groomserver::channels::sms::{SmsError, SmsSender};
use groomserver::ledger::{LedgerClient, LedgerError};
use groomserver::queue::{JobQueue, MemoryQueue};
use groomserver::reminders::{ReminderQueueOptions, ReminderService};
use groomserver::scheduling::{AppointmentService, CreateAppointmentRequest};
use groomserver::store::{GroomStore, MemoryStore};
use groomserver::sync::{SyncQueueOptions, SyncService};

pub struct RecordingSms {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingSms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, to: &str, message: &str) -> Result<String, SmsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SmsError::Provider("status 500".to_string()));
        }
        let mut sent = self.sent.lock().await;
        sent.push((to.to_string(), message.to_string()));
        Ok(format!("sms-{}", sent.len()))
    }
}

pub struct CountingLedger {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for CountingLedger {
    async fn sync_appointment(&self, _snapshot: &serde_json::Value) -> Result<String, LedgerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            Err(LedgerError::Api("status 503".to_string()))
        } else {
            Ok(format!("ext-{}", n))
        }
    }
}

pub struct TestApp {
    pub tenant: Uuid,
    pub store: Arc<MemoryStore>,
    pub queue: MemoryQueue,
    pub sms: Arc<RecordingSms>,
    pub ledger: Arc<CountingLedger>,
    pub appointments: Arc<AppointmentService>,
    pub reminders: Arc<ReminderService>,
    pub sync: Arc<SyncService>,
    pub customer: Uuid,
    pub location: Uuid,
}

pub async fn setup() -> TestApp {
    let tenant = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let customer = store
        .seed_customer(tenant, "Dana Pryce", Some("+15550001"))
        .await;
    let location = store.seed_location(tenant).await;

    let queue = MemoryQueue::new();
    let sms = RecordingSms::new();
    let ledger = CountingLedger::new();

    let store_dyn: Arc<dyn GroomStore> = store.clone();
    let queue_dyn: Arc<dyn JobQueue> = Arc::new(queue.clone());

    let reminders = Arc::new(ReminderService::new(
        Arc::clone(&store_dyn),
        Arc::clone(&queue_dyn),
        sms.clone(),
        ReminderQueueOptions {
            max_attempts: 3,
            backoff_base_ms: 10,
        },
    ));
    let sync = Arc::new(SyncService::new(
        Arc::clone(&store_dyn),
        Arc::clone(&queue_dyn),
        ledger.clone(),
        SyncQueueOptions {
            max_attempts: 3,
            backoff_base_ms: 10,
        },
    ));
    let appointments = Arc::new(AppointmentService::new(
        store_dyn,
        Arc::clone(&reminders),
        Arc::clone(&sync),
    ));

    TestApp {
        tenant,
        store,
        queue,
        sms,
        ledger,
        appointments,
        reminders,
        sync,
        customer,
        location,
    }
}

impl TestApp {
    pub fn booking(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            location_id: self.location,
            customer_id: self.customer,
            pet_id: None,
            service_id: None,
            starts_at: start,
            ends_at: end,
            notes: None,
        }
    }
}

/// 2026-03-14 at the given clock time, UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
}
