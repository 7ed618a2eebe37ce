//! HTTP client for the notification gateway.
//!
//! Notifications are best-effort: delivery runs on a spawned task after
//! the triggering operation has already committed, and a failed delivery
//! is logged and dropped. No retry loop here; the gateway queues
//! internally.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::clients::credentials::ServiceCredentials;
use crate::clients::{Notification, Notifier};
use crate::config::EngineConfig;
use crate::error::EngineError;

const TARGET: &str = "notification";

pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<ServiceCredentials>,
}

impl HttpNotifier {
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
            base_url: config
                .notification_base_url
                .trim_end_matches('/')
                .to_string(),
            credentials,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: Notification) -> Result<(), EngineError> {
        let token = self.credentials.bearer_token()?;
        let url = format!("{}/notifications", self.base_url);
        debug!(
            upstream = TARGET,
            appointment = %notification.external_id,
            channel = notification.channel.as_str(),
            "dispatching notification"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&notification)
            .send()
            .await
            .map_err(|e| EngineError::DependencyUnavailable {
                target: TARGET,
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::DependencyUnavailable {
                target: TARGET,
                cause: format!("unexpected status {status}"),
            });
        }
        Ok(())
    }
}
