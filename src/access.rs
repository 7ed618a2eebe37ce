//! Role-based access decisions. `authorize` either denies the operation
//! outright or returns the scope the store must apply, so a patient can
//! never observe whether someone else's appointment exists.

use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Role;

/// The caller of an engine operation.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// The operation being attempted, with the inputs the decision needs.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Booking on behalf of this patient.
    Create { patient_id: Uuid },
    Read,
    Update,
    Cancel,
    Complete,
}

/// Row-level restriction the store applies on top of the query. An
/// unrestricted scope means the actor sees everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

impl ScopeFilter {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            doctor_id: None,
        }
    }

    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self {
            patient_id: None,
            doctor_id: Some(doctor_id),
        }
    }
}

/// Decide whether `actor` may attempt `op`, and under which row scope.
pub fn authorize(actor: &Actor, op: &Operation) -> Result<ScopeFilter, EngineError> {
    match (actor.role, op) {
        // Admins act on any appointment.
        (Role::Admin, _) => Ok(ScopeFilter::unrestricted()),

        // The system actor only marks appointments completed, but reads
        // freely to find them.
        (Role::System, Operation::Complete) | (Role::System, Operation::Read) => {
            Ok(ScopeFilter::unrestricted())
        }
        (Role::System, _) => Err(EngineError::denied(
            "system actor may only complete or read appointments",
        )),

        (Role::Patient, Operation::Create { patient_id }) => {
            if *patient_id == actor.id {
                Ok(ScopeFilter::for_patient(actor.id))
            } else {
                Err(EngineError::denied(
                    "patients may only book appointments for themselves",
                ))
            }
        }
        (Role::Patient, Operation::Read)
        | (Role::Patient, Operation::Update)
        | (Role::Patient, Operation::Cancel) => Ok(ScopeFilter::for_patient(actor.id)),
        (Role::Patient, Operation::Complete) => {
            Err(EngineError::denied("patients may not complete appointments"))
        }

        // Doctors consult their calendar but never change it themselves.
        (Role::Doctor, Operation::Read) => Ok(ScopeFilter::for_doctor(actor.id)),
        (Role::Doctor, _) => Err(EngineError::denied(
            "doctors have read-only access to their schedule",
        )),
    }
}
