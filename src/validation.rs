//! Structural validation of incoming requests. These checks are local
//! and synchronous; role checks and upstream verification happen later.
//!
//! All applicable rules run before returning, so a caller sees every
//! violation at once instead of fixing them one at a time.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{AppointmentPatch, CreateAppointmentRequest, Page, Recurrence};

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 120;
pub const MAX_NOTES_LEN: usize = 500;

/// One failed rule, named by the request field it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Violation {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_date(date: DateTime<Utc>, now: DateTime<Utc>, out: &mut Vec<Violation>) {
    if date <= now {
        out.push(Violation::new("date", "must be in the future"));
    }
}

fn check_duration(minutes: i64, out: &mut Vec<Violation>) {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        out.push(Violation::new(
            "durationMinutes",
            format!("must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}"),
        ));
    }
}

fn check_notes(notes: Option<&str>, out: &mut Vec<Violation>) {
    if let Some(notes) = notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            out.push(Violation::new(
                "notes",
                format!("must not exceed {MAX_NOTES_LEN} characters"),
            ));
        }
    }
}

fn check_recurrence(
    recurrence: Option<&Recurrence>,
    start: DateTime<Utc>,
    out: &mut Vec<Violation>,
) {
    if let Some(r) = recurrence {
        if r.interval < 1 {
            out.push(Violation::new("recurrence.interval", "must be at least 1"));
        }
        if r.end_date <= start {
            out.push(Violation::new(
                "recurrence.endDate",
                "must be after the appointment date",
            ));
        }
    }
}

/// Check a create request. Empty result means the request is well-formed.
pub fn validate_create(req: &CreateAppointmentRequest, now: DateTime<Utc>) -> Vec<Violation> {
    let mut out = Vec::new();
    check_date(req.date, now, &mut out);
    check_duration(req.duration_minutes, &mut out);
    check_notes(req.notes.as_deref(), &mut out);
    check_recurrence(req.recurrence.as_ref(), req.date, &mut out);
    out
}

/// Check an update patch. Rules only apply to fields the patch touches:
/// a notes-only update never trips the future-date rule, but moving the
/// appointment re-checks the (merged) date.
pub fn validate_update(
    patch: &AppointmentPatch,
    effective_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<Violation> {
    let mut out = Vec::new();
    if patch.date.is_some() {
        check_date(effective_date, now, &mut out);
    }
    if let Some(minutes) = patch.duration_minutes {
        check_duration(minutes, &mut out);
    }
    check_notes(patch.notes.as_deref(), &mut out);
    check_recurrence(patch.recurrence.as_ref(), effective_date, &mut out);
    out
}

/// Check pagination parameters before they reach the store.
pub fn validate_page(page: &Page) -> Vec<Violation> {
    let mut out = Vec::new();
    if page.page < 1 {
        out.push(Violation::new("page", "must be at least 1"));
    }
    if page.limit < 1 || page.limit > Page::MAX_LIMIT {
        out.push(Violation::new(
            "limit",
            format!("must be between 1 and {}", Page::MAX_LIMIT),
        ));
    }
    out
}
