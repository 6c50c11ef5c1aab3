use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{format_date, format_time, parse_date, parse_datetime, parse_optional_date},
    models::{Session, TrackingRecord},
};
use crate::error::{EngineError, Result};

pub(crate) fn row_to_session(row: &Row) -> Result<Session> {
    let start_date: String = row.get("start_date")?;
    let end_date: String = row.get("end_date")?;
    let first_use_date: Option<String> = row.get("first_use_date")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let active: i64 = row.get("active")?;

    Ok(Session {
        id: row.get("id")?,
        patient_id: row.get("patient_id")?,
        schedule_id: row.get("schedule_id")?,
        start_date: parse_date(&start_date, "start_date")?,
        end_date: parse_date(&end_date, "end_date")?,
        tz_offset_minutes: row.get("tz_offset_minutes")?,
        active: active != 0,
        first_use_date: parse_optional_date(first_use_date, "first_use_date")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

const SESSION_COLUMNS: &str = "id, patient_id, schedule_id, start_date, end_date, \
     tz_offset_minutes, active, first_use_date, created_at, updated_at";

fn insert_records(tx: &Transaction<'_>, records: &[TrackingRecord]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO tracking_records
             (id, session_id, scheduled_date, scheduled_time, status, taken_at, dose_count, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for record in records {
        stmt.execute(params![
            record.id,
            record.session_id,
            format_date(record.scheduled_date),
            format_time(record.scheduled_time),
            record.status.as_str(),
            record.taken_at.as_ref().map(|dt| dt.to_rfc3339()),
            i64::from(record.dose_count),
            record.notes,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ])?;
    }

    Ok(())
}

impl Database {
    /// Creates the session row together with its full materialized record
    /// set in one transaction. Any key collision (a concurrent start that
    /// won the active slot, or a duplicate (date, time) cell) rolls the
    /// whole set back and surfaces as `Conflict`; consumers never observe
    /// a partially populated session.
    pub async fn insert_session_with_records(
        &self,
        session: &Session,
        records: &[TrackingRecord],
    ) -> Result<()> {
        let session = session.clone();
        let records = records.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO sessions
                     (id, patient_id, schedule_id, start_date, end_date, tz_offset_minutes, active, first_use_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    session.id,
                    session.patient_id,
                    session.schedule_id,
                    format_date(session.start_date),
                    format_date(session.end_date),
                    session.tz_offset_minutes,
                    session.active as i64,
                    session.first_use_date.map(format_date),
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )?;

            insert_records(&tx, &records)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(EngineError::not_found(format!(
                    "session {session_id} does not exist"
                ))),
            }
        })
        .await
    }

    pub async fn find_active_session(
        &self,
        patient_id: &str,
        schedule_id: Option<&str>,
    ) -> Result<Option<Session>> {
        let patient_id = patient_id.to_string();
        let schedule_id = schedule_id.map(str::to_string);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE patient_id = ?1
                   AND coalesce(schedule_id, '') = coalesce(?2, '')
                   AND active = 1"
            ))?;

            let mut rows = stmt.query(params![patient_id, schedule_id])?;
            match rows.next()? {
                Some(row) => row_to_session(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Conditional deactivation of whichever session currently holds the
    /// active slot for (patient, schedule). Returns the number of sessions
    /// superseded (0 or 1 given the unique index).
    pub async fn supersede_active_session(
        &self,
        patient_id: &str,
        schedule_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let patient_id = patient_id.to_string();
        let schedule_id = schedule_id.map(str::to_string);
        self.execute(move |conn| {
            let superseded = conn.execute(
                "UPDATE sessions
                 SET active = 0,
                     updated_at = ?1
                 WHERE patient_id = ?2
                   AND coalesce(schedule_id, '') = coalesce(?3, '')
                   AND active = 1",
                params![now.to_rfc3339(), patient_id, schedule_id],
            )?;
            Ok(superseded)
        })
        .await
    }

    /// One-time write of the session's first-use date. The `IS NULL` guard
    /// makes it idempotent and monotonic: once set, later acknowledgments
    /// cannot move it.
    pub async fn set_first_use_date(
        &self,
        session_id: &str,
        first_use_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions
                 SET first_use_date = ?1,
                     updated_at = ?2
                 WHERE id = ?3
                   AND first_use_date IS NULL",
                params![format_date(first_use_date), now.to_rfc3339(), session_id],
            )?;
            Ok(updated == 1)
        })
        .await
    }
}
