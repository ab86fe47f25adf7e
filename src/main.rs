use std::sync::Arc;

use dotenvy::dotenv;
use log::info;

use groomserver::channels::sms::{HttpSmsProvider, SmsSender};
use groomserver::config::AppConfig;
use groomserver::ledger::{HttpLedgerClient, LedgerClient};
use groomserver::queue::{JobQueue, MemoryQueue, WorkerPool, REMINDER_QUEUE, SYNC_QUEUE};
use groomserver::reminders::{ReminderJobHandler, ReminderQueueOptions, ReminderService};
use groomserver::scheduling::AppointmentService;
use groomserver::shared::state::AppState;
use groomserver::shared::utils::create_conn;
use groomserver::store::{GroomStore, PostgresStore};
use groomserver::sync::{
    ReaperSettings, StaleWorkReaper, SyncJobHandler, SyncQueueOptions, SyncService,
    SYNC_ATTEMPT_CEILING,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::load()?;
    let pool = create_conn(&config.database_url())?;
    let store: Arc<dyn GroomStore> = Arc::new(PostgresStore::new(pool));

    let memory_queue = MemoryQueue::new();
    let queue: Arc<dyn JobQueue> = Arc::new(memory_queue.clone());
    let sms: Arc<dyn SmsSender> = Arc::new(HttpSmsProvider::new(&config.sms));
    let ledger: Arc<dyn LedgerClient> = Arc::new(HttpLedgerClient::new(&config.ledger));

    let reminders = Arc::new(ReminderService::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&sms),
        ReminderQueueOptions {
            max_attempts: config.workers.reminder_max_attempts,
            backoff_base_ms: config.workers.reminder_backoff_base_ms,
        },
    ));
    let sync_options = SyncQueueOptions {
        max_attempts: config.workers.sync_max_attempts,
        backoff_base_ms: config.workers.sync_backoff_base_ms,
    };
    let sync = Arc::new(SyncService::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&ledger),
        sync_options,
    ));
    let appointments = Arc::new(AppointmentService::new(
        Arc::clone(&store),
        Arc::clone(&reminders),
        Arc::clone(&sync),
    ));

    let reminder_rx = memory_queue
        .take_receiver(REMINDER_QUEUE)
        .await
        .ok_or("reminder queue receiver already taken")?;
    WorkerPool::spawn(
        "reminders",
        REMINDER_QUEUE,
        reminder_rx,
        Arc::clone(&queue),
        Arc::new(ReminderJobHandler::new(Arc::clone(&reminders))),
        config.workers.reminder_concurrency,
        config.workers.reminder_rate_per_sec,
    );

    let sync_rx = memory_queue
        .take_receiver(SYNC_QUEUE)
        .await
        .ok_or("sync queue receiver already taken")?;
    WorkerPool::spawn(
        "sync-events",
        SYNC_QUEUE,
        sync_rx,
        Arc::clone(&queue),
        Arc::new(SyncJobHandler::new(Arc::clone(&sync))),
        config.workers.sync_concurrency,
        config.workers.sync_rate_per_sec,
    );

    Arc::new(StaleWorkReaper::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        sync_options,
        ReaperSettings {
            period_secs: config.reaper.period_secs,
            cooldown_secs: config.reaper.cooldown_secs,
            batch_size: config.reaper.batch_size,
            max_attempts: SYNC_ATTEMPT_CEILING,
        },
    ))
    .spawn();

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        store,
        queue,
        appointments,
        reminders,
        sync,
        config,
    });

    let app = axum::Router::new()
        .merge(groomserver::scheduling::configure())
        .merge(groomserver::reminders::configure())
        .merge(groomserver::sync::configure())
        .with_state(state);

    info!("groomserver listening on {}", address);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
