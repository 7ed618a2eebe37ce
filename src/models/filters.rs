use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::enums::{AppointmentKind, AppointmentStatus};

/// Caller-supplied listing filters, applied on top of the access scope.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub facility_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub kind: Option<AppointmentKind>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Pagination window. Bounds (page >= 1, 1 <= limit <= 100) are enforced
/// by `validation::validate_page`.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Rows to skip. Widened to u64 so any page number the bounds
    /// checks accept stays exact.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}
