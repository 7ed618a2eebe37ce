//! HTTP client for the facility registry.
//!
//! `GET {base}/facilities/{id}`. Same retry discipline as the identity
//! client; an inactive facility is a definitive rejection.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::clients::credentials::ServiceCredentials;
use crate::clients::identity::status_is_retryable;
use crate::clients::retry::{self, AttemptError, RetryOutcome, RetryPolicy};
use crate::clients::{Facility, FacilityValidator};
use crate::config::EngineConfig;
use crate::error::EngineError;

const TARGET: &str = "facility";

/// Activity gate applied to a fetched facility. Shared with test fakes.
pub(crate) fn check_facility(facility: Facility) -> Result<Facility, EngineError> {
    if !facility.active {
        return Err(EngineError::ValidationRejected {
            target: TARGET,
            reason: format!("facility {} ({}) is inactive", facility.id, facility.name),
        });
    }
    Ok(facility)
}

pub struct HttpFacilityValidator {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<ServiceCredentials>,
    retry: RetryPolicy,
}

impl HttpFacilityValidator {
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
            base_url: config.facility_base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_delay),
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Facility, AttemptError<EngineError>> {
        let token = self.credentials.bearer_token().map_err(AttemptError::Terminal)?;
        let url = format!("{}/facilities/{id}", self.base_url);
        debug!(upstream = TARGET, %id, "looking up facility");

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
                reason: format!("facility {id} does not exist"),
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

        response.json::<Facility>().await.map_err(|e| {
            AttemptError::Terminal(EngineError::Internal(format!(
                "facility response malformed: {e}"
            )))
        })
    }
}

#[async_trait]
impl FacilityValidator for HttpFacilityValidator {
    async fn verify(&self, id: Uuid) -> Result<Facility, EngineError> {
        let facility = retry::run(&self.retry, TARGET, || self.fetch(id))
            .await
            .map_err(|outcome| match outcome {
                RetryOutcome::Terminal(e) => e,
                RetryOutcome::Exhausted(e) => EngineError::DependencyUnavailable {
                    target: TARGET,
                    cause: e.to_string(),
                },
            })?;
        check_facility(facility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_facility_passes_gate() {
        let facility = Facility {
            id: Uuid::new_v4(),
            name: "Northside Clinic".into(),
            active: true,
        };
        assert!(check_facility(facility).is_ok());
    }

    #[test]
    fn inactive_facility_is_rejected() {
        let facility = Facility {
            id: Uuid::new_v4(),
            name: "Closed Annex".into(),
            active: false,
        };
        let err = check_facility(facility).unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_REJECTED");
        assert!(err.to_string().contains("inactive"));
    }
}
