pub mod appointment;
pub mod enums;
pub mod filters;

pub use appointment::{
    Appointment, AppointmentPatch, Consent, ConsentRequest, CreateAppointmentRequest, Recurrence,
};
pub use enums::{
    AppointmentKind, AppointmentStatus, ConsentPurpose, NotificationChannel, RecurrenceType, Role,
};
pub use filters::{AppointmentFilter, Page};
