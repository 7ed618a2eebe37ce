//! Engine-level error type. Every public operation returns `EngineError`;
//! lower layers (store, upstream clients) convert into it at the seam.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::validation::Violation;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Input failed a local structural rule. Carries every violation
    /// found, not just the first.
    #[error("validation failed: {}", format_violations(.violations))]
    ValidationFailed { violations: Vec<Violation> },

    /// The actor is not allowed to perform this operation at all.
    #[error("not authorized: {reason}")]
    AuthorizationDenied { reason: String },

    /// An upstream system answered and said no (wrong role, missing
    /// verification, inactive facility). Retrying will not help.
    #[error("{target} rejected the request: {reason}")]
    ValidationRejected { target: &'static str, reason: String },

    /// An upstream system could not be reached after retries.
    #[error("{target} unavailable: {cause}")]
    DependencyUnavailable { target: &'static str, cause: String },

    /// The requested slot collides with the doctor's calendar.
    #[error("doctor {doctor_id} is unavailable between {start} and {end}")]
    SchedulingConflict {
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// No visible appointment with this id. Also returned when the row
    /// exists outside the caller's scope.
    #[error("appointment {0} not found")]
    NotFound(Uuid),

    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("internal error: {0}")]
    Internal(String),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Stable machine-readable code, independent of message wording.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ValidationFailed { .. } => "VALIDATION_FAILED",
            EngineError::AuthorizationDenied { .. } => "AUTHORIZATION_DENIED",
            EngineError::ValidationRejected { .. } => "VALIDATION_REJECTED",
            EngineError::DependencyUnavailable { .. } => "DEPENDENCY_UNAVAILABLE",
            EngineError::SchedulingConflict { .. } => "SCHEDULING_CONFLICT",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Store(_) => "STORE",
            EngineError::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(violations: Vec<Violation>) -> Self {
        EngineError::ValidationFailed { violations }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        EngineError::AuthorizationDenied {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable() {
        let err = EngineError::NotFound(Uuid::nil());
        assert_eq!(err.kind(), "NOT_FOUND");

        let err = EngineError::denied("patients may only book for themselves");
        assert_eq!(err.kind(), "AUTHORIZATION_DENIED");
    }

    #[test]
    fn validation_message_joins_all_violations() {
        let err = EngineError::validation(vec![
            Violation::new("date", "must be in the future"),
            Violation::new("durationMinutes", "must be between 15 and 120"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("date"));
        assert!(msg.contains("durationMinutes"));
    }
}
