//! Upstream service clients: identity lookup, facility registry and the
//! notification gateway. The traits are the seams the lifecycle manager
//! depends on; the `Http*` implementations talk to real services and
//! tests substitute fakes.

pub mod credentials;
pub mod facility;
pub mod identity;
pub mod notify;
pub mod retry;

pub use facility::HttpFacilityValidator;
pub use identity::HttpIdentityValidator;
pub use notify::HttpNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{NotificationChannel, Role};

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A person as the identity service reports them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    pub role: Role,
    pub kyc_verified: bool,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// A facility as the registry reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

/// One outbound notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    /// Correlates the notification back to the appointment it concerns.
    pub external_id: Uuid,
}

// ─── Seams ────────────────────────────────────────────────────────────────────

/// Verifies people against the identity service and returns their record.
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Fetch `id` and confirm it is a real, eligible person holding
    /// `expected_role`. Doctors must additionally be KYC-verified.
    async fn verify(&self, id: Uuid, expected_role: Role) -> Result<Person, EngineError>;
}

/// Verifies facilities against the registry.
#[async_trait]
pub trait FacilityValidator: Send + Sync {
    /// Fetch `id` and confirm the facility exists and is active.
    async fn verify(&self, id: Uuid) -> Result<Facility, EngineError>;
}

/// Delivers notifications. Failures here never fail the triggering
/// operation; callers dispatch and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), EngineError>;
}
