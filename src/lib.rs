pub mod channels;
pub mod config;
pub mod ledger;
pub mod queue;
pub mod reminders;
pub mod scheduling;
pub mod shared;
pub mod store;
pub mod sync;
