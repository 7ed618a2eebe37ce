//! HTTP client for the identity service.
//!
//! `GET {base}/users/{id}` returns the person record. Transport
//! failures and 5xx responses are retried; a 404 or any other 4xx is a
//! definitive answer. Role and verification checks run locally on the
//! returned record so fakes share the exact same gate.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::clients::credentials::ServiceCredentials;
use crate::clients::retry::{self, AttemptError, RetryOutcome, RetryPolicy};
use crate::clients::{IdentityValidator, Person};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::Role;

const TARGET: &str = "identity";

/// Classify an HTTP status: 5xx may recover, everything else is final.
pub(crate) fn status_is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Role/eligibility gate applied to a fetched person record. Shared by
/// the HTTP client and by test fakes.
pub(crate) fn check_person(person: Person, expected_role: Role) -> Result<Person, EngineError> {
    if person.role != expected_role {
        return Err(EngineError::ValidationRejected {
            target: TARGET,
            reason: format!(
                "person {} holds role {}, expected {}",
                person.id,
                person.role.as_str(),
                expected_role.as_str()
            ),
        });
    }
    if expected_role == Role::Doctor && !person.kyc_verified {
        return Err(EngineError::ValidationRejected {
            target: TARGET,
            reason: format!("doctor {} is not KYC-verified", person.id),
        });
    }
    Ok(person)
}

pub struct HttpIdentityValidator {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<ServiceCredentials>,
    retry: RetryPolicy,
}

impl HttpIdentityValidator {
    pub fn new(
        config: &EngineConfig,
        credentials: Arc<ServiceCredentials>,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.identity_base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_delay),
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Person, AttemptError<EngineError>> {
        let token = self.credentials.bearer_token().map_err(AttemptError::Terminal)?;
        let url = format!("{}/users/{id}", self.base_url);
        debug!(upstream = TARGET, %id, "looking up person");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                AttemptError::Retryable(EngineError::DependencyUnavailable {
                    target: TARGET,
                    cause: e.to_string(),
                })
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AttemptError::Terminal(EngineError::ValidationRejected {
                target: TARGET,
                reason: format!("person {id} does not exist"),
            }));
        }
        if !status.is_success() {
            let err = EngineError::DependencyUnavailable {
                target: TARGET,
                cause: format!("unexpected status {status}"),
            };
            return Err(if status_is_retryable(status) {
                AttemptError::Retryable(err)
            } else {
                AttemptError::Terminal(err)
            });
        }

        response.json::<Person>().await.map_err(|e| {
            AttemptError::Terminal(EngineError::Internal(format!(
                "identity response malformed: {e}"
            )))
        })
    }
}

#[async_trait]
impl IdentityValidator for HttpIdentityValidator {
    async fn verify(&self, id: Uuid, expected_role: Role) -> Result<Person, EngineError> {
        let person = retry::run(&self.retry, TARGET, || self.fetch(id))
            .await
            .map_err(|outcome| match outcome {
                RetryOutcome::Terminal(e) => e,
                RetryOutcome::Exhausted(e) => EngineError::DependencyUnavailable {
                    target: TARGET,
                    cause: e.to_string(),
                },
            })?;
        check_person(person, expected_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(role: Role, kyc_verified: bool) -> Person {
        Person {
            id: Uuid::new_v4(),
            role,
            kyc_verified,
            email: "pat@example.org".into(),
            phone_number: None,
        }
    }

    #[test]
    fn verified_doctor_passes_gate() {
        let p = person(Role::Doctor, true);
        assert!(check_person(p, Role::Doctor).is_ok());
    }

    #[test]
    fn unverified_doctor_is_rejected() {
        let p = person(Role::Doctor, false);
        let err = check_person(p, Role::Doctor).unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_REJECTED");
        assert!(err.to_string().contains("KYC"));
    }

    #[test]
    fn role_mismatch_is_rejected() {
        let p = person(Role::Patient, true);
        let err = check_person(p, Role::Doctor).unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_REJECTED");
    }

    #[test]
    fn patient_needs_no_kyc() {
        let p = person(Role::Patient, false);
        assert!(check_person(p, Role::Patient).is_ok());
    }

    #[test]
    fn only_server_errors_are_retryable() {
        assert!(status_is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(status_is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!status_is_retryable(StatusCode::NOT_FOUND));
        assert!(!status_is_retryable(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!status_is_retryable(StatusCode::UNAUTHORIZED));
    }
}
