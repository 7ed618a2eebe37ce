//! Runtime configuration. Values come from `CURASCHED_*` environment
//! variables with defaults suitable for local development.

use std::env;
use std::time::Duration;

pub const APP_NAME: &str = "curasched";

/// Minimum gap enforced between the end of a requested slot and the next
/// appointment already on the doctor's calendar.
pub const DEFAULT_CONFLICT_BUFFER_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the identity service (patient/doctor lookup).
    pub identity_base_url: String,
    /// Base URL of the facility registry.
    pub facility_base_url: String,
    /// Base URL of the notification gateway.
    pub notification_base_url: String,
    /// Shared secret for signing service-to-service tokens.
    pub service_secret: String,
    /// Per-request timeout on upstream calls.
    pub call_timeout: Duration,
    /// Attempts per upstream call before giving up.
    pub retry_max_attempts: u32,
    /// Fixed delay between retry attempts.
    pub retry_delay: Duration,
    /// Buffer applied ahead of existing appointments during conflict checks.
    pub conflict_buffer_minutes: i64,
    /// Lifetime of cached service credentials.
    pub credential_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity_base_url: "http://localhost:8081".into(),
            facility_base_url: "http://localhost:8082".into(),
            notification_base_url: "http://localhost:8083".into(),
            service_secret: "dev-secret".into(),
            call_timeout: Duration::from_secs(5),
            retry_max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            conflict_buffer_minutes: DEFAULT_CONFLICT_BUFFER_MINUTES,
            credential_ttl_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Build from the environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            identity_base_url: env_or("CURASCHED_IDENTITY_URL", defaults.identity_base_url),
            facility_base_url: env_or("CURASCHED_FACILITY_URL", defaults.facility_base_url),
            notification_base_url: env_or(
                "CURASCHED_NOTIFICATION_URL",
                defaults.notification_base_url,
            ),
            service_secret: env_or("CURASCHED_SERVICE_SECRET", defaults.service_secret),
            call_timeout: Duration::from_secs(parsed_env_or(
                "CURASCHED_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )),
            retry_max_attempts: parsed_env_or(
                "CURASCHED_RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            ),
            retry_delay: Duration::from_secs(parsed_env_or(
                "CURASCHED_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )),
            conflict_buffer_minutes: parsed_env_or(
                "CURASCHED_CONFLICT_BUFFER_MINUTES",
                defaults.conflict_buffer_minutes,
            ),
            credential_ttl_secs: parsed_env_or(
                "CURASCHED_CREDENTIAL_TTL_SECS",
                defaults.credential_ttl_secs,
            ),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn parsed_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.conflict_buffer_minutes, 120);
    }

    #[test]
    fn unset_env_falls_back_to_defaults() {
        // from_env must never fail, whatever the environment looks like.
        let config = EngineConfig::from_env();
        assert!(!config.identity_base_url.is_empty());
        assert!(config.retry_max_attempts >= 1);
    }
}
