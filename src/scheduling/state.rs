//! Central lifecycle transition table. Every status change goes through
//! [`transition`]; there are no ad hoc status-string checks elsewhere.

use crate::shared::models::AppointmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Cancel,
    MarkDone,
    MarkNoShow,
}

impl LifecycleAction {
    fn target(&self) -> AppointmentStatus {
        match self {
            Self::Cancel => AppointmentStatus::Cancelled,
            Self::MarkDone => AppointmentStatus::Done,
            Self::MarkNoShow => AppointmentStatus::NoShow,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::MarkDone => "mark done",
            Self::MarkNoShow => "mark no-show",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the new status.
    Apply(AppointmentStatus),
    /// Already there; idempotent repeat, return the record unchanged.
    Noop,
    /// Invalid move out of a sticky terminal state.
    Rejected,
}

pub fn transition(current: AppointmentStatus, action: LifecycleAction) -> Transition {
    let target = action.target();
    if current == target {
        return Transition::Noop;
    }
    match current {
        AppointmentStatus::Scheduled => Transition::Apply(target),
        // Terminal states are sticky; only the idempotent repeat above passes.
        AppointmentStatus::Cancelled | AppointmentStatus::Done | AppointmentStatus::NoShow => {
            Transition::Rejected
        }
    }
}
