//! Appointment entity, consent record, recurrence descriptor and the
//! request/patch DTOs the lifecycle manager consumes.
//!
//! `appointment_id` is assigned once at creation and never changes; it is
//! distinct from the store's own row identity. `deleted` and
//! `status == cancelled` are the same fact observed from two fields, and
//! every mutation path keeps them in sync.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentKind, AppointmentStatus, ConsentPurpose, RecurrenceType};

// ─── Consent ──────────────────────────────────────────────────────────────────

/// Patient consent attached to an appointment.
///
/// `granted_at` is set if and only if `given` was true at the time the
/// consent was last recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    pub given: bool,
    pub purpose: ConsentPurpose,
    pub granted_at: Option<DateTime<Utc>>,
}

impl Consent {
    /// Record a consent decision, stamping `granted_at` only when given.
    pub fn record(given: bool, purpose: ConsentPurpose, now: DateTime<Utc>) -> Self {
        Self {
            given,
            purpose,
            granted_at: given.then_some(now),
        }
    }
}

// ─── Recurrence ───────────────────────────────────────────────────────────────

/// Recurrence descriptor. Absence means a single, non-recurring appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub rule: RecurrenceType,
    pub interval: u32,
    pub end_date: DateTime<Utc>,
}

// ─── Appointment ──────────────────────────────────────────────────────────────

/// The central entity: one concrete appointment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    /// Start timestamp, strictly in the future at creation/update time.
    pub date: DateTime<Utc>,
    /// Bounded to [15, 120] by validation.
    pub duration_minutes: i64,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub deleted: bool,
    pub consent: Consent,
    pub recurrence: Option<Recurrence>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Derived end timestamp: start + duration.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.date + Duration::minutes(self.duration_minutes)
    }

    /// Whether this row still participates in conflict detection.
    pub fn is_active(&self) -> bool {
        !self.deleted && self.status != AppointmentStatus::Cancelled
    }
}

// ─── Request DTOs ─────────────────────────────────────────────────────────────

/// Consent decision as submitted by a client; `granted_at` is stamped
/// server-side via [`Consent::record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub given: bool,
    pub purpose: ConsentPurpose,
}

/// Payload for creating one appointment (or a recurring series).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub kind: AppointmentKind,
    pub consent: ConsentRequest,
    pub recurrence: Option<Recurrence>,
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    /// Materialize the base appointment row for this request.
    pub fn into_appointment(self, created_by: Uuid, now: DateTime<Utc>) -> Appointment {
        Appointment {
            appointment_id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            facility_id: self.facility_id,
            date: self.date,
            duration_minutes: self.duration_minutes,
            kind: self.kind,
            status: AppointmentStatus::Scheduled,
            deleted: false,
            consent: Consent::record(self.consent.given, self.consent.purpose, now),
            recurrence: self.recurrence,
            notes: self.notes,
            created_by,
            updated_by: created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field-level patch for update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub doctor_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub kind: Option<AppointmentKind>,
    pub consent: Option<ConsentRequest>,
    pub recurrence: Option<Recurrence>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    /// Whether applying this patch requires re-running conflict detection.
    pub fn reschedules(&self) -> bool {
        self.date.is_some() || self.duration_minutes.is_some() || self.doctor_id.is_some()
    }

    /// Merge into an existing appointment, re-stamping the audit fields.
    /// Identity, status, deleted flag and created_* fields are untouchable
    /// through this path.
    pub fn apply(&self, existing: &Appointment, updated_by: Uuid, now: DateTime<Utc>) -> Appointment {
        let mut merged = existing.clone();
        if let Some(doctor_id) = self.doctor_id {
            merged.doctor_id = doctor_id;
        }
        if let Some(facility_id) = self.facility_id {
            merged.facility_id = facility_id;
        }
        if let Some(date) = self.date {
            merged.date = date;
        }
        if let Some(duration) = self.duration_minutes {
            merged.duration_minutes = duration;
        }
        if let Some(kind) = self.kind {
            merged.kind = kind;
        }
        if let Some(consent) = &self.consent {
            merged.consent = Consent::record(consent.given, consent.purpose, now);
        }
        if let Some(recurrence) = &self.recurrence {
            merged.recurrence = Some(recurrence.clone());
        }
        if let Some(notes) = &self.notes {
            merged.notes = Some(notes.clone());
        }
        merged.updated_by = updated_by;
        merged.updated_at = now;
        merged
    }
}
