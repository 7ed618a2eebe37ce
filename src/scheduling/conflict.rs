//! Doctor-calendar conflict detection.
//!
//! A proposed slot is rejected when it overlaps an existing active
//! appointment, or when an existing appointment started within the
//! buffer window before the proposed slot would end. With the default
//! two-hour buffer an existing 10:00 appointment blocks any new slot
//! ending at or before 12:00, while a 13:00 slot goes through.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// One active entry on a doctor's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedSlot {
    pub appointment_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The existing slot a proposal collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Check a proposed `[start, end)` slot against the doctor's schedule.
/// `exclude` skips one appointment (the one being rescheduled) so it
/// never conflicts with itself. Returns the first offending window.
pub fn find_conflict(
    schedule: &[BookedSlot],
    proposed_start: DateTime<Utc>,
    proposed_end: DateTime<Utc>,
    exclude: Option<Uuid>,
    buffer: Duration,
) -> Option<ConflictWindow> {
    for slot in schedule {
        if exclude == Some(slot.appointment_id) {
            continue;
        }
        let overlaps = slot.start < proposed_end && slot.end > proposed_start;
        let within_buffer =
            slot.start >= proposed_end - buffer && slot.start < proposed_end;
        if overlaps || within_buffer {
            return Some(ConflictWindow {
                start: slot.start,
                end: slot.end,
            });
        }
    }
    None
}
