//! curasched: appointment scheduling and lifecycle engine.
//!
//! The [`lifecycle::AppointmentService`] ties everything together:
//! role-based access ([`access`]), structural validation
//! ([`validation`]), recurrence expansion and conflict detection
//! ([`scheduling`]), the SQLite store ([`db`]) and the upstream
//! identity/facility/notification clients ([`clients`]).

pub mod access;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod scheduling;
pub mod validation;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. RUST_LOG overrides the
/// default filter; calling this twice is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
