use std::sync::Arc;

use crate::config::AppConfig;
use crate::queue::JobQueue;
use crate::reminders::ReminderService;
use crate::scheduling::AppointmentService;
use crate::store::GroomStore;
use crate::sync::SyncService;

pub struct AppState {
    pub store: Arc<dyn GroomStore>,
    pub queue: Arc<dyn JobQueue>,
    pub appointments: Arc<AppointmentService>,
    pub reminders: Arc<ReminderService>,
    pub sync: Arc<SyncService>,
    pub config: AppConfig,
}
