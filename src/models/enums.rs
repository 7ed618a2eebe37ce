use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(AppointmentKind {
    InPerson => "in-person",
    Telemedicine => "telemedicine",
});

str_enum!(RecurrenceType {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

str_enum!(ConsentPurpose {
    Treatment => "treatment",
    Billing => "billing",
    Research => "research",
});

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
    System => "system",
});

str_enum!(NotificationChannel {
    Email => "email",
    Sms => "sms",
});
