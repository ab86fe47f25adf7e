//! Interval conflict detection over half-open [start, end) ranges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::models::Appointment;

/// Two half-open intervals intersect iff each starts before the other ends.
/// Touching endpoints do not conflict.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// A colliding booking, reported back to the caller so it can suggest an
/// alternative slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictWindow {
    pub appointment_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<&Appointment> for ConflictWindow {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            starts_at: appointment.starts_at,
            ends_at: appointment.ends_at,
        }
    }
}

pub fn conflict_windows(conflicts: &[Appointment]) -> Vec<ConflictWindow> {
    conflicts.iter().map(ConflictWindow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn detects_partial_overlap() {
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 30), at(11, 30)));
    }

    #[test]
    fn detects_containment() {
        assert!(overlaps(at(10, 0), at(12, 0), at(10, 30), at(11, 0)));
        assert!(overlaps(at(10, 30), at(11, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (at(10, 0), at(11, 0), at(10, 30), at(11, 30)),
            (at(10, 0), at(11, 0), at(11, 0), at(12, 0)),
            (at(9, 0), at(9, 30), at(10, 0), at(10, 30)),
            (at(10, 0), at(12, 0), at(10, 30), at(11, 0)),
        ];
        for (a1, a2, b1, b2) in cases {
            assert_eq!(overlaps(a1, a2, b1, b2), overlaps(b1, b2, a1, a2));
        }
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        assert!(!overlaps(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(!overlaps(at(11, 0), at(12, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!overlaps(at(8, 0), at(9, 0), at(10, 0), at(11, 0)));
    }
}
