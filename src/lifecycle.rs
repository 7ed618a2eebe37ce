//! Appointment lifecycle manager: the single entry point for booking,
//! reading, updating, cancelling and completing appointments.
//!
//! Every mutation follows the same shape: authorize, validate locally,
//! verify collaborators upstream, then apply the change inside one store
//! transaction. Notifications go out only after the transaction commits,
//! on detached tasks that can never fail the operation itself.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{authorize, Actor, Operation};
use crate::clients::{
    IdentityValidator, FacilityValidator, Notification, Notifier, Person,
};
use crate::config::EngineConfig;
use crate::db::repository::appointment as repo;
use crate::error::EngineError;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus,
    CreateAppointmentRequest, NotificationChannel, Page, Role,
};
use crate::scheduling::{self, conflict::BookedSlot};
use crate::validation::{self, Violation};

// ─── Lifecycle events ─────────────────────────────────────────────────────────

/// What happened to an appointment, for patient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created,
    Updated,
    Cancelled,
}

impl LifecycleEvent {
    fn subject(&self) -> &'static str {
        match self {
            LifecycleEvent::Created => "Appointment confirmed",
            LifecycleEvent::Updated => "Appointment updated",
            LifecycleEvent::Cancelled => "Appointment cancelled",
        }
    }

    fn message(&self, appointment: &Appointment) -> String {
        let when = appointment.date.format("%Y-%m-%d %H:%M UTC");
        match self {
            LifecycleEvent::Created => format!(
                "Your {} appointment is confirmed for {when}.",
                appointment.kind.as_str()
            ),
            LifecycleEvent::Updated => {
                format!("Your appointment details changed; it is now set for {when}.")
            }
            LifecycleEvent::Cancelled => {
                format!("Your appointment scheduled for {when} has been cancelled.")
            }
        }
    }

    fn notification(&self, appointment: &Appointment, contact: &Person) -> Notification {
        Notification {
            channel: NotificationChannel::Email,
            recipient: contact.email.clone(),
            subject: self.subject().to_string(),
            message: self.message(appointment),
            external_id: appointment.appointment_id,
        }
    }
}

// ─── Service ──────────────────────────────────────────────────────────────────

pub struct AppointmentService {
    store: Mutex<Connection>,
    identity: Arc<dyn IdentityValidator>,
    facility: Arc<dyn FacilityValidator>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl AppointmentService {
    pub fn new(
        store: Connection,
        identity: Arc<dyn IdentityValidator>,
        facility: Arc<dyn FacilityValidator>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            identity,
            facility,
            notifier,
            config,
        }
    }

    /// The store lock is never held across an await point; all upstream
    /// calls happen before or after the locked section.
    fn lock_store(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.store
            .lock()
            .map_err(|_| EngineError::Internal("store lock poisoned".into()))
    }

    fn buffer(&self) -> Duration {
        Duration::minutes(self.config.conflict_buffer_minutes)
    }

    // ─── Create ───────────────────────────────────────────────────────────────

    /// Book an appointment, expanding a recurring request into its whole
    /// series. The series is all-or-nothing: one conflicting instance
    /// rejects the entire request.
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<Vec<Appointment>, EngineError> {
        authorize(
            actor,
            &Operation::Create {
                patient_id: request.patient_id,
            },
        )?;

        let now = Utc::now();
        let violations = validation::validate_create(&request, now);
        if !violations.is_empty() {
            return Err(EngineError::validation(violations));
        }

        let patient = self
            .identity
            .verify(request.patient_id, Role::Patient)
            .await?;
        self.identity.verify(request.doctor_id, Role::Doctor).await?;
        self.facility.verify(request.facility_id).await?;

        let base = request.into_appointment(actor.id, now);
        let instances = scheduling::expand(&base);

        {
            let mut conn = self.lock_store()?;
            let tx = conn.transaction().map_err(crate::db::DatabaseError::from)?;

            let mut schedule = repo::doctor_schedule(&tx, base.doctor_id)?;
            for instance in &instances {
                if let Some(window) = scheduling::find_conflict(
                    &schedule,
                    instance.date,
                    instance.end_time(),
                    None,
                    self.buffer(),
                ) {
                    return Err(EngineError::SchedulingConflict {
                        doctor_id: instance.doctor_id,
                        start: window.start,
                        end: window.end,
                    });
                }
                // Later instances must also clear the ones accepted so far.
                schedule.push(BookedSlot {
                    appointment_id: instance.appointment_id,
                    start: instance.date,
                    end: instance.end_time(),
                });
                repo::insert(&tx, instance)?;
            }

            tx.commit().map_err(crate::db::DatabaseError::from)?;
        }

        info!(
            appointment = %base.appointment_id,
            instances = instances.len(),
            "appointment booked"
        );
        for instance in &instances {
            self.notify(instance, LifecycleEvent::Created, Some(patient.clone()));
        }
        Ok(instances)
    }

    // ─── Read ─────────────────────────────────────────────────────────────────

    /// Fetch one appointment visible to the actor. An appointment outside
    /// the actor's scope is reported as missing, not as forbidden.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Appointment, EngineError> {
        let scope = authorize(actor, &Operation::Read)?;
        let conn = self.lock_store()?;
        repo::find_by_id(&conn, id, &scope)?.ok_or(EngineError::NotFound(id))
    }

    /// List appointments visible to the actor, filtered and paginated.
    /// Returns the page plus the total match count.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &AppointmentFilter,
        page: &Page,
    ) -> Result<(Vec<Appointment>, u64), EngineError> {
        let scope = authorize(actor, &Operation::Read)?;
        let violations = validation::validate_page(page);
        if !violations.is_empty() {
            return Err(EngineError::validation(violations));
        }
        let conn = self.lock_store()?;
        Ok(repo::list(&conn, &scope, filter, page)?)
    }

    // ─── Update ───────────────────────────────────────────────────────────────

    /// Apply a partial update. Changes touching the calendar (date,
    /// duration, doctor) re-run conflict detection against everything but
    /// the appointment itself; a notes-only edit skips it entirely.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, EngineError> {
        let scope = authorize(actor, &Operation::Update)?;
        let now = Utc::now();

        // Replacement collaborators are verified before the store is touched.
        if let Some(doctor_id) = patch.doctor_id {
            self.identity.verify(doctor_id, Role::Doctor).await?;
        }
        if let Some(facility_id) = patch.facility_id {
            self.facility.verify(facility_id).await?;
        }

        let merged = {
            let mut conn = self.lock_store()?;
            let tx = conn.transaction().map_err(crate::db::DatabaseError::from)?;

            let existing =
                repo::find_by_id(&tx, id, &scope)?.ok_or(EngineError::NotFound(id))?;
            let merged = patch.apply(&existing, actor.id, now);

            let violations = validation::validate_update(&patch, merged.date, now);
            if !violations.is_empty() {
                return Err(EngineError::validation(violations));
            }

            if patch.reschedules() {
                let schedule = repo::doctor_schedule(&tx, merged.doctor_id)?;
                if let Some(window) = scheduling::find_conflict(
                    &schedule,
                    merged.date,
                    merged.end_time(),
                    Some(merged.appointment_id),
                    self.buffer(),
                ) {
                    return Err(EngineError::SchedulingConflict {
                        doctor_id: merged.doctor_id,
                        start: window.start,
                        end: window.end,
                    });
                }
            }

            if repo::update(&tx, &merged)? == 0 {
                return Err(EngineError::NotFound(id));
            }
            tx.commit().map_err(crate::db::DatabaseError::from)?;
            merged
        };

        info!(appointment = %id, "appointment updated");
        self.notify(&merged, LifecycleEvent::Updated, None);
        Ok(merged)
    }

    // ─── Cancel ───────────────────────────────────────────────────────────────

    /// Cancel an appointment. Cancellation is terminal: the row drops out
    /// of every default read, so cancelling twice reports NotFound.
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<(), EngineError> {
        let scope = authorize(actor, &Operation::Cancel)?;
        let now = Utc::now();

        let cancelled = {
            let conn = self.lock_store()?;
            let existing =
                repo::find_by_id(&conn, id, &scope)?.ok_or(EngineError::NotFound(id))?;
            if repo::mark_cancelled(&conn, id, &scope, actor.id, now)? == 0 {
                return Err(EngineError::NotFound(id));
            }
            existing
        };

        info!(appointment = %id, "appointment cancelled");
        self.notify(&cancelled, LifecycleEvent::Cancelled, None);
        Ok(())
    }

    // ─── Complete ─────────────────────────────────────────────────────────────

    /// Mark a scheduled appointment as completed. Driven by the system
    /// actor after the appointment time passes, or by an admin.
    pub async fn complete(&self, actor: &Actor, id: Uuid) -> Result<Appointment, EngineError> {
        let scope = authorize(actor, &Operation::Complete)?;
        let now = Utc::now();

        let conn = self.lock_store()?;
        let existing = repo::find_by_id(&conn, id, &scope)?.ok_or(EngineError::NotFound(id))?;
        if existing.status != AppointmentStatus::Scheduled {
            return Err(EngineError::validation(vec![Violation::new(
                "status",
                format!(
                    "only scheduled appointments can be completed, this one is {}",
                    existing.status.as_str()
                ),
            )]));
        }
        if repo::mark_completed(&conn, id, actor.id, now)? == 0 {
            return Err(EngineError::NotFound(id));
        }

        info!(appointment = %id, "appointment completed");
        repo::find_by_id(&conn, id, &scope)?.ok_or(EngineError::NotFound(id))
    }

    // ─── Notifications ────────────────────────────────────────────────────────

    /// Detached best-effort notification. When the caller already holds
    /// the patient record it is passed in; otherwise the task looks it up
    /// itself. Failures are logged and dropped.
    fn notify(&self, appointment: &Appointment, event: LifecycleEvent, contact: Option<Person>) {
        let identity = Arc::clone(&self.identity);
        let notifier = Arc::clone(&self.notifier);
        let appointment = appointment.clone();
        tokio::spawn(async move {
            let contact = match contact {
                Some(person) => person,
                None => match identity.verify(appointment.patient_id, Role::Patient).await {
                    Ok(person) => person,
                    Err(e) => {
                        warn!(
                            appointment = %appointment.appointment_id,
                            error = %e,
                            "could not resolve notification contact"
                        );
                        return;
                    }
                },
            };
            let notification = event.notification(&appointment, &contact);
            if let Err(e) = notifier.send(notification).await {
                warn!(
                    appointment = %appointment.appointment_id,
                    error = %e,
                    "notification delivery failed"
                );
            }
        });
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
