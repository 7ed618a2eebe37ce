//! Appointment persistence. Business rules (conflict detection, access
//! decisions) live outside this layer; every function here is a plain
//! read or write against the `appointments` table.
//!
//! Default read scope excludes soft-deleted rows: a cancelled appointment
//! is invisible to `find_by_id` and `list`, which is what makes a second
//! cancel indistinguishable from "not found".

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, ToSql};
use uuid::Uuid;

use crate::access::ScopeFilter;
use crate::db::DatabaseError;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Consent, Page, Recurrence,
};
use crate::scheduling::conflict::BookedSlot;

const COLUMNS: &str = "appointment_id, patient_id, doctor_id, facility_id, date, \
                       duration_minutes, kind, status, deleted, \
                       consent_given, consent_purpose, consent_granted_at, \
                       recurrence_type, recurrence_interval, recurrence_end_date, \
                       notes, created_by, updated_by, created_at, updated_at";

fn parse_enum<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    T::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_appointment(row: &Row) -> rusqlite::Result<Appointment> {
    let kind: String = row.get(6)?;
    let status: String = row.get(7)?;
    let purpose: String = row.get(10)?;

    let recurrence_type: Option<String> = row.get(12)?;
    let recurrence = match recurrence_type {
        Some(rule) => Some(Recurrence {
            rule: parse_enum(12, &rule)?,
            interval: row.get(13)?,
            end_date: row.get(14)?,
        }),
        None => None,
    };

    Ok(Appointment {
        appointment_id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        facility_id: row.get(3)?,
        date: row.get(4)?,
        duration_minutes: row.get(5)?,
        kind: parse_enum(6, &kind)?,
        status: parse_enum(7, &status)?,
        deleted: row.get(8)?,
        consent: Consent {
            given: row.get(9)?,
            purpose: parse_enum(10, &purpose)?,
            granted_at: row.get(11)?,
        },
        recurrence,
        notes: row.get(15)?,
        created_by: row.get(16)?,
        updated_by: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

/// Insert one appointment row.
pub fn insert(conn: &Connection, a: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (appointment_id, patient_id, doctor_id, facility_id, date,
             duration_minutes, kind, status, deleted,
             consent_given, consent_purpose, consent_granted_at,
             recurrence_type, recurrence_interval, recurrence_end_date,
             notes, created_by, updated_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            a.appointment_id,
            a.patient_id,
            a.doctor_id,
            a.facility_id,
            a.date,
            a.duration_minutes,
            a.kind.as_str(),
            a.status.as_str(),
            a.deleted,
            a.consent.given,
            a.consent.purpose.as_str(),
            a.consent.granted_at,
            a.recurrence.as_ref().map(|r| r.rule.as_str()),
            a.recurrence.as_ref().map(|r| r.interval),
            a.recurrence.as_ref().map(|r| r.end_date),
            a.notes,
            a.created_by,
            a.updated_by,
            a.created_at,
            a.updated_at,
        ],
    )?;
    Ok(())
}

/// Load one non-deleted appointment within the given access scope.
pub fn find_by_id(
    conn: &Connection,
    id: Uuid,
    scope: &ScopeFilter,
) -> Result<Option<Appointment>, DatabaseError> {
    let mut sql = format!(
        "SELECT {COLUMNS} FROM appointments WHERE appointment_id = ?1 AND deleted = 0"
    );
    let mut bind: Vec<&dyn ToSql> = vec![&id];
    if let Some(patient_id) = &scope.patient_id {
        sql.push_str(&format!(" AND patient_id = ?{}", bind.len() + 1));
        bind.push(patient_id);
    }
    if let Some(doctor_id) = &scope.doctor_id {
        sql.push_str(&format!(" AND doctor_id = ?{}", bind.len() + 1));
        bind.push(doctor_id);
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(rusqlite::params_from_iter(bind), row_to_appointment)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// List non-deleted appointments matching scope + filters, newest first,
/// with the unpaginated total for the same predicate.
pub fn list(
    conn: &Connection,
    scope: &ScopeFilter,
    filter: &AppointmentFilter,
    page: &Page,
) -> Result<(Vec<Appointment>, u64), DatabaseError> {
    let mut clauses = vec!["deleted = 0".to_string()];
    let mut bind: Vec<Box<dyn ToSql>> = Vec::new();

    let push = |clauses: &mut Vec<String>, bind: &mut Vec<Box<dyn ToSql>>, column: &str, op: &str, value: Box<dyn ToSql>| {
        bind.push(value);
        clauses.push(format!("{column} {op} ?{}", bind.len()));
    };

    if let Some(patient_id) = scope.patient_id {
        push(&mut clauses, &mut bind, "patient_id", "=", Box::new(patient_id));
    }
    if let Some(doctor_id) = scope.doctor_id {
        push(&mut clauses, &mut bind, "doctor_id", "=", Box::new(doctor_id));
    }
    if let Some(facility_id) = filter.facility_id {
        push(&mut clauses, &mut bind, "facility_id", "=", Box::new(facility_id));
    }
    if let Some(status) = filter.status {
        push(&mut clauses, &mut bind, "status", "=", Box::new(status.as_str()));
    }
    if let Some(kind) = filter.kind {
        push(&mut clauses, &mut bind, "kind", "=", Box::new(kind.as_str()));
    }
    if let Some(from) = filter.date_from {
        push(&mut clauses, &mut bind, "date", ">=", Box::new(from));
    }
    if let Some(to) = filter.date_to {
        push(&mut clauses, &mut bind, "date", "<=", Box::new(to));
    }

    let predicate = clauses.join(" AND ");

    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM appointments WHERE {predicate}"),
        rusqlite::params_from_iter(bind.iter().map(|b| b.as_ref())),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {COLUMNS} FROM appointments WHERE {predicate}
         ORDER BY date DESC LIMIT {} OFFSET {}",
        page.limit,
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(bind.iter().map(|b| b.as_ref())),
        row_to_appointment,
    )?;
    let items = rows.collect::<Result<Vec<_>, _>>()?;

    Ok((items, total))
}

/// The doctor's active (non-cancelled) calendar, for conflict detection.
pub fn doctor_schedule(conn: &Connection, doctor_id: Uuid) -> Result<Vec<BookedSlot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT appointment_id, date, duration_minutes
         FROM appointments
         WHERE doctor_id = ?1 AND deleted = 0 AND status != 'cancelled'
         ORDER BY date ASC",
    )?;

    let rows = stmt.query_map(params![doctor_id], |row| {
        let start: DateTime<Utc> = row.get(1)?;
        let duration_minutes: i64 = row.get(2)?;
        Ok(BookedSlot {
            appointment_id: row.get(0)?,
            start,
            end: start + chrono::Duration::minutes(duration_minutes),
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Persist a merged appointment produced by an update. The row identity,
/// created_* fields and the soft-delete flag are not writable here.
pub fn update(conn: &Connection, a: &Appointment) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET
             doctor_id = ?1, facility_id = ?2, date = ?3, duration_minutes = ?4,
             kind = ?5, consent_given = ?6, consent_purpose = ?7, consent_granted_at = ?8,
             recurrence_type = ?9, recurrence_interval = ?10, recurrence_end_date = ?11,
             notes = ?12, updated_by = ?13, updated_at = ?14
         WHERE appointment_id = ?15 AND deleted = 0",
        params![
            a.doctor_id,
            a.facility_id,
            a.date,
            a.duration_minutes,
            a.kind.as_str(),
            a.consent.given,
            a.consent.purpose.as_str(),
            a.consent.granted_at,
            a.recurrence.as_ref().map(|r| r.rule.as_str()),
            a.recurrence.as_ref().map(|r| r.interval),
            a.recurrence.as_ref().map(|r| r.end_date),
            a.notes,
            a.updated_by,
            a.updated_at,
            a.appointment_id,
        ],
    )?;
    Ok(changed)
}

/// Terminal cancellation: status and deleted flip together. Returns the
/// number of rows changed (0 when the scoped row does not exist or is
/// already cancelled).
pub fn mark_cancelled(
    conn: &Connection,
    id: Uuid,
    scope: &ScopeFilter,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let mut sql = String::from(
        "UPDATE appointments SET status = 'cancelled', deleted = 1, updated_by = ?1, updated_at = ?2
         WHERE appointment_id = ?3 AND deleted = 0",
    );
    let mut bind: Vec<&dyn ToSql> = vec![&actor, &now, &id];
    if let Some(patient_id) = &scope.patient_id {
        sql.push_str(&format!(" AND patient_id = ?{}", bind.len() + 1));
        bind.push(patient_id);
    }
    if let Some(doctor_id) = &scope.doctor_id {
        sql.push_str(&format!(" AND doctor_id = ?{}", bind.len() + 1));
        bind.push(doctor_id);
    }

    let changed = conn.execute(&sql, rusqlite::params_from_iter(bind))?;
    Ok(changed)
}

/// Terminal completion, only ever leaving `scheduled`.
pub fn mark_completed(
    conn: &Connection,
    id: Uuid,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = 'completed', updated_by = ?1, updated_at = ?2
         WHERE appointment_id = ?3 AND deleted = 0 AND status = ?4",
        params![actor, now, id, AppointmentStatus::Scheduled.as_str()],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{AppointmentKind, ConsentPurpose, ConsentRequest, CreateAppointmentRequest};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample(doctor_id: Uuid, patient_id: Uuid, date: &str) -> Appointment {
        CreateAppointmentRequest {
            patient_id,
            doctor_id,
            facility_id: Uuid::new_v4(),
            date: ts(date),
            duration_minutes: 30,
            kind: AppointmentKind::Telemedicine,
            consent: ConsentRequest {
                given: true,
                purpose: ConsentPurpose::Treatment,
            },
            recurrence: None,
            notes: None,
        }
        .into_appointment(Uuid::new_v4(), ts("2027-01-01T00:00:00Z"))
    }

    #[test]
    fn insert_and_find_round_trip() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let found = find_by_id(&conn, appt.appointment_id, &ScopeFilter::unrestricted())
            .unwrap()
            .unwrap();
        assert_eq!(found, appt);
    }

    #[test]
    fn find_respects_patient_scope() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let own_scope = ScopeFilter::for_patient(appt.patient_id);
        assert!(find_by_id(&conn, appt.appointment_id, &own_scope)
            .unwrap()
            .is_some());

        let other_scope = ScopeFilter::for_patient(Uuid::new_v4());
        assert!(find_by_id(&conn, appt.appointment_id, &other_scope)
            .unwrap()
            .is_none());
    }

    #[test]
    fn cancelled_rows_leave_default_read_scope() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let changed = mark_cancelled(
            &conn,
            appt.appointment_id,
            &ScopeFilter::unrestricted(),
            Uuid::new_v4(),
            ts("2027-01-02T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(changed, 1);

        assert!(find_by_id(&conn, appt.appointment_id, &ScopeFilter::unrestricted())
            .unwrap()
            .is_none());

        // Second cancel touches nothing.
        let changed = mark_cancelled(
            &conn,
            appt.appointment_id,
            &ScopeFilter::unrestricted(),
            Uuid::new_v4(),
            ts("2027-01-03T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(changed, 0);

        // Both fields flipped together on the underlying row.
        let (status, deleted): (String, bool) = conn
            .query_row(
                "SELECT status, deleted FROM appointments WHERE appointment_id = ?1",
                params![appt.appointment_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "cancelled");
        assert!(deleted);
    }

    #[test]
    fn doctor_schedule_excludes_cancelled() {
        let conn = open_memory_database().unwrap();
        let doctor = Uuid::new_v4();
        let first = sample(doctor, Uuid::new_v4(), "2027-03-01T10:00:00Z");
        let second = sample(doctor, Uuid::new_v4(), "2027-03-02T10:00:00Z");
        insert(&conn, &first).unwrap();
        insert(&conn, &second).unwrap();

        mark_cancelled(
            &conn,
            second.appointment_id,
            &ScopeFilter::unrestricted(),
            Uuid::new_v4(),
            Utc::now(),
        )
        .unwrap();

        let schedule = doctor_schedule(&conn, doctor).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].appointment_id, first.appointment_id);
        assert_eq!(schedule[0].end, first.end_time());
    }

    #[test]
    fn list_filters_and_paginates() {
        let conn = open_memory_database().unwrap();
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();
        for day in 1..=5 {
            let appt = sample(doctor, patient, &format!("2027-03-0{day}T10:00:00Z"));
            insert(&conn, &appt).unwrap();
        }

        let scope = ScopeFilter::for_doctor(doctor);
        let (items, total) = list(
            &conn,
            &scope,
            &AppointmentFilter::default(),
            &Page { page: 1, limit: 2 },
        )
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        // Newest first.
        assert_eq!(items[0].date, ts("2027-03-05T10:00:00Z"));

        let (page3, _) = list(
            &conn,
            &scope,
            &AppointmentFilter::default(),
            &Page { page: 3, limit: 2 },
        )
        .unwrap();
        assert_eq!(page3.len(), 1);

        let filtered = AppointmentFilter {
            date_from: Some(ts("2027-03-03T00:00:00Z")),
            date_to: Some(ts("2027-03-04T23:59:59Z")),
            ..Default::default()
        };
        let (items, total) = list(&conn, &scope, &filtered, &Page::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn list_scope_mismatch_is_empty() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let (items, total) = list(
            &conn,
            &ScopeFilter::for_patient(Uuid::new_v4()),
            &AppointmentFilter::default(),
            &Page::default(),
        )
        .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn update_persists_merged_fields() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let mut merged = appt.clone();
        merged.notes = Some("fasting bloods beforehand".into());
        merged.duration_minutes = 45;
        merged.updated_at = ts("2027-01-05T00:00:00Z");
        let changed = update(&conn, &merged).unwrap();
        assert_eq!(changed, 1);

        let found = find_by_id(&conn, appt.appointment_id, &ScopeFilter::unrestricted())
            .unwrap()
            .unwrap();
        assert_eq!(found.notes.as_deref(), Some("fasting bloods beforehand"));
        assert_eq!(found.duration_minutes, 45);
        assert_eq!(found.created_at, appt.created_at);
    }

    #[test]
    fn mark_completed_only_leaves_scheduled() {
        let conn = open_memory_database().unwrap();
        let appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        insert(&conn, &appt).unwrap();

        let changed = mark_completed(&conn, appt.appointment_id, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(changed, 1);

        // completed is terminal
        let changed = mark_completed(&conn, appt.appointment_id, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(changed, 0);

        let found = find_by_id(&conn, appt.appointment_id, &ScopeFilter::unrestricted())
            .unwrap()
            .unwrap();
        assert_eq!(found.status, AppointmentStatus::Completed);
        assert!(!found.deleted);
    }

    #[test]
    fn recurrence_columns_round_trip() {
        let conn = open_memory_database().unwrap();
        let mut appt = sample(Uuid::new_v4(), Uuid::new_v4(), "2027-03-01T10:00:00Z");
        appt.recurrence = Some(Recurrence {
            rule: crate::models::RecurrenceType::Weekly,
            interval: 2,
            end_date: ts("2027-06-01T10:00:00Z"),
        });
        insert(&conn, &appt).unwrap();

        let found = find_by_id(&conn, appt.appointment_id, &ScopeFilter::unrestricted())
            .unwrap()
            .unwrap();
        assert_eq!(found.recurrence, appt.recurrence);
    }
}
