//! Recurrence expansion. A recurring request is expanded eagerly at
//! creation time into one row per instance; there is no lazy series
//! materialization later.

use chrono::{DateTime, Duration, Months, Utc};
use uuid::Uuid;

use crate::models::{Appointment, RecurrenceType};

/// Expand an appointment into its concrete instances.
///
/// The base appointment is always the first instance and keeps its own
/// id; follow-up instances are clones with a fresh id and a shifted
/// date. Instances are generated while the shifted date stays on or
/// before the rule's end date, so the end date itself can host the last
/// instance. A non-recurring appointment expands to just itself.
pub fn expand(base: &Appointment) -> Vec<Appointment> {
    let Some(recurrence) = &base.recurrence else {
        return vec![base.clone()];
    };

    // Validation rejects interval 0, but termination must not depend on
    // the caller having gone through it.
    let interval = recurrence.interval.max(1);

    let mut instances = vec![base.clone()];
    let mut cursor = base.date;
    loop {
        let Some(next) = step(cursor, recurrence.rule, interval) else {
            break;
        };
        if next > recurrence.end_date {
            break;
        }
        let mut instance = base.clone();
        instance.appointment_id = Uuid::new_v4();
        instance.date = next;
        instances.push(instance);
        cursor = next;
    }
    instances
}

/// Advance one recurrence period. Monthly steps clamp to the last day of
/// the target month (Jan 31 + 1 month = Feb 28/29); daily and weekly
/// steps are exact.
fn step(from: DateTime<Utc>, rule: RecurrenceType, interval: u32) -> Option<DateTime<Utc>> {
    match rule {
        RecurrenceType::Daily => from.checked_add_signed(Duration::days(i64::from(interval))),
        RecurrenceType::Weekly => {
            from.checked_add_signed(Duration::weeks(i64::from(interval)))
        }
        RecurrenceType::Monthly => from.checked_add_months(Months::new(interval)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AppointmentKind, ConsentPurpose, ConsentRequest, CreateAppointmentRequest, Recurrence,
    };

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn recurring(date: &str, rule: RecurrenceType, interval: u32, end: &str) -> Appointment {
        CreateAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            date: ts(date),
            duration_minutes: 30,
            kind: AppointmentKind::Telemedicine,
            consent: ConsentRequest {
                given: true,
                purpose: ConsentPurpose::Treatment,
            },
            recurrence: Some(Recurrence {
                rule,
                interval,
                end_date: ts(end),
            }),
            notes: None,
        }
        .into_appointment(Uuid::new_v4(), ts("2027-01-01T00:00:00Z"))
    }

    #[test]
    fn non_recurring_expands_to_itself() {
        let mut base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Daily,
            1,
            "2027-03-05T10:00:00Z",
        );
        base.recurrence = None;

        let instances = expand(&base);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0], base);
    }

    #[test]
    fn weekly_series_lands_on_end_date() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Weekly,
            1,
            "2027-03-29T10:00:00Z",
        );
        let instances = expand(&base);

        assert_eq!(instances.len(), 5);
        assert_eq!(instances[0].appointment_id, base.appointment_id);
        assert_eq!(instances[0].date, ts("2027-03-01T10:00:00Z"));
        assert_eq!(instances[4].date, ts("2027-03-29T10:00:00Z"));
        for pair in instances.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::weeks(1));
        }
    }

    #[test]
    fn end_date_just_short_of_next_instance_excludes_it() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Weekly,
            1,
            "2027-03-29T09:59:59Z",
        );
        assert_eq!(expand(&base).len(), 4);
    }

    #[test]
    fn end_date_before_start_yields_base_only() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Daily,
            1,
            "2027-02-01T10:00:00Z",
        );
        let instances = expand(&base);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].appointment_id, base.appointment_id);
    }

    #[test]
    fn interval_skips_periods() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Daily,
            3,
            "2027-03-10T10:00:00Z",
        );
        let dates: Vec<_> = expand(&base).iter().map(|a| a.date).collect();
        assert_eq!(
            dates,
            vec![
                ts("2027-03-01T10:00:00Z"),
                ts("2027-03-04T10:00:00Z"),
                ts("2027-03-07T10:00:00Z"),
                ts("2027-03-10T10:00:00Z"),
            ]
        );
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let base = recurring(
            "2027-01-31T09:00:00Z",
            RecurrenceType::Monthly,
            1,
            "2027-04-30T09:00:00Z",
        );
        let dates: Vec<_> = expand(&base).iter().map(|a| a.date).collect();
        assert_eq!(
            dates,
            vec![
                ts("2027-01-31T09:00:00Z"),
                ts("2027-02-28T09:00:00Z"),
                ts("2027-03-28T09:00:00Z"),
                ts("2027-04-28T09:00:00Z"),
            ]
        );
    }

    #[test]
    fn instances_share_everything_but_id_and_date() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Weekly,
            2,
            "2027-04-01T10:00:00Z",
        );
        let instances = expand(&base);
        assert!(instances.len() > 1);

        let mut ids = std::collections::HashSet::new();
        for instance in &instances {
            assert!(ids.insert(instance.appointment_id), "duplicate instance id");
            assert_eq!(instance.patient_id, base.patient_id);
            assert_eq!(instance.doctor_id, base.doctor_id);
            assert_eq!(instance.duration_minutes, base.duration_minutes);
            assert_eq!(instance.consent, base.consent);
            assert_eq!(instance.recurrence, base.recurrence);
        }
    }

    #[test]
    fn zero_interval_still_terminates() {
        let base = recurring(
            "2027-03-01T10:00:00Z",
            RecurrenceType::Daily,
            0,
            "2027-03-04T10:00:00Z",
        );
        // Treated as an interval of one; never an infinite series.
        let dates: Vec<_> = expand(&base).iter().map(|a| a.date).collect();
        assert_eq!(dates.len(), 4);
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
    }

    #[test]
    fn dates_strictly_increase() {
        let base = recurring(
            "2027-03-31T10:00:00Z",
            RecurrenceType::Monthly,
            1,
            "2028-03-31T10:00:00Z",
        );
        let instances = expand(&base);
        assert_eq!(instances.len(), 13);
        for pair in instances.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }
}
