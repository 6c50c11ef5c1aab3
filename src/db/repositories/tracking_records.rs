use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_date, parse_date, parse_datetime, parse_optional_datetime, parse_record_status,
        parse_time, to_u32,
    },
    models::{RecordStatus, TrackingRecord},
};
use crate::error::{EngineError, Result};

/// Which record set a summary or range query covers.
#[derive(Debug, Clone)]
pub enum SummaryScope {
    Session(String),
    Schedule(String),
}

/// A pending record eligible for lapse evaluation, joined with its
/// session's offset so the due instant can be resolved in one place.
#[derive(Debug, Clone)]
pub struct SweepCandidate {
    pub record_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub tz_offset_minutes: i32,
}

#[derive(Debug, Clone)]
pub struct StatusCountRow {
    pub status: RecordStatus,
    pub count: u64,
}

fn row_to_record(row: &Row) -> Result<TrackingRecord> {
    let scheduled_date: String = row.get("scheduled_date")?;
    let scheduled_time: String = row.get("scheduled_time")?;
    let status: String = row.get("status")?;
    let taken_at: Option<String> = row.get("taken_at")?;
    let dose_count: i64 = row.get("dose_count")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(TrackingRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        scheduled_date: parse_date(&scheduled_date, "scheduled_date")?,
        scheduled_time: parse_time(&scheduled_time, "scheduled_time")?,
        status: parse_record_status(&status)?,
        taken_at: parse_optional_datetime(taken_at, "taken_at")?,
        dose_count: to_u32(dose_count, "dose_count")?,
        notes: row.get("notes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

const RECORD_COLUMNS: &str = "id, session_id, scheduled_date, scheduled_time, status, \
     taken_at, dose_count, notes, created_at, updated_at";

impl Database {
    pub async fn get_record(&self, record_id: &str) -> Result<TrackingRecord> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM tracking_records WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![record_id])?;
            match rows.next()? {
                Some(row) => row_to_record(row),
                None => Err(EngineError::not_found(format!(
                    "tracking record {record_id} does not exist"
                ))),
            }
        })
        .await
    }

    /// Persists a manual acknowledgment. Notes are overwritten only when
    /// provided; `coalesce` keeps the stored value for a NULL parameter.
    pub async fn update_record_resolution(
        &self,
        record_id: &str,
        status: RecordStatus,
        taken_at: Option<DateTime<Utc>>,
        dose_count: u32,
        notes: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE tracking_records
                 SET status = ?1,
                     taken_at = ?2,
                     dose_count = ?3,
                     notes = coalesce(?4, notes),
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    status.as_str(),
                    taken_at.map(|dt| dt.to_rfc3339()),
                    i64::from(dose_count),
                    notes,
                    updated_at.to_rfc3339(),
                    record_id,
                ],
            )?;

            if updated == 0 {
                return Err(EngineError::not_found(format!(
                    "tracking record {record_id} does not exist"
                )));
            }
            Ok(())
        })
        .await
    }

    /// Note update carrying the on-write lapse guard's outcome: the status
    /// written is whatever the guard decided the record should persist as.
    pub async fn update_record_notes(
        &self,
        record_id: &str,
        notes: Option<String>,
        status: RecordStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE tracking_records
                 SET notes = ?1,
                     status = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![notes, status.as_str(), updated_at.to_rfc3339(), record_id],
            )?;

            if updated == 0 {
                return Err(EngineError::not_found(format!(
                    "tracking record {record_id} does not exist"
                )));
            }
            Ok(())
        })
        .await
    }

    /// Lapse transition conditioned on the record still being pending at
    /// write time, so a concurrent manual acknowledgment always wins.
    pub async fn mark_missed_if_pending(
        &self,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE tracking_records
                 SET status = 'missed',
                     updated_at = ?1
                 WHERE id = ?2
                   AND status = 'pending'",
                params![now.to_rfc3339(), record_id],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    /// The calendar grid: every record of a session ordered by date, time.
    pub async fn get_records_for_session(&self, session_id: &str) -> Result<Vec<TrackingRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM tracking_records
                 WHERE session_id = ?1
                 ORDER BY scheduled_date ASC, scheduled_time ASC"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Pending records of active sessions, optionally narrowed to one
    /// session, joined with the session offset for due-instant resolution.
    pub async fn get_sweep_candidates(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<SweepCandidate>> {
        let session_id = session_id.map(str::to_string);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.scheduled_date, r.scheduled_time, s.tz_offset_minutes
                 FROM tracking_records r
                 JOIN sessions s ON s.id = r.session_id
                 WHERE r.status = 'pending'
                   AND s.active = 1
                   AND (?1 IS NULL OR r.session_id = ?1)
                 ORDER BY r.scheduled_date ASC, r.scheduled_time ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut candidates = Vec::new();
            while let Some(row) = rows.next()? {
                let scheduled_date: String = row.get(1)?;
                let scheduled_time: String = row.get(2)?;
                candidates.push(SweepCandidate {
                    record_id: row.get(0)?,
                    scheduled_date: parse_date(&scheduled_date, "scheduled_date")?,
                    scheduled_time: parse_time(&scheduled_time, "scheduled_time")?,
                    tz_offset_minutes: row.get(3)?,
                });
            }

            Ok(candidates)
        })
        .await
    }

    /// Range query behind summaries and "current vs. history" views: one
    /// record store, filtered by scope and an optional inclusive date range.
    pub async fn get_records_in_scope(
        &self,
        scope: SummaryScope,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<TrackingRecord>> {
        self.execute(move |conn| {
            let (filter, key) = scope_filter(&scope);
            let (from, to) = range_params(date_range);

            let mut stmt = conn.prepare(&format!(
                "SELECT r.id, r.session_id, r.scheduled_date, r.scheduled_time, r.status,
                        r.taken_at, r.dose_count, r.notes, r.created_at, r.updated_at
                 FROM tracking_records r
                 JOIN sessions s ON s.id = r.session_id
                 WHERE {filter}
                   AND (?2 IS NULL OR r.scheduled_date >= ?2)
                   AND (?3 IS NULL OR r.scheduled_date <= ?3)
                 ORDER BY r.scheduled_date ASC, r.scheduled_time ASC"
            ))?;

            let mut rows = stmt.query(params![key, from, to])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Aggregate counts per status for a scope; the analytics module folds
    /// these into an `AdherenceSummary`.
    pub async fn count_records_by_status(
        &self,
        scope: SummaryScope,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<StatusCountRow>> {
        self.execute(move |conn| {
            let (filter, key) = scope_filter(&scope);
            let (from, to) = range_params(date_range);

            let mut stmt = conn.prepare(&format!(
                "SELECT r.status, COUNT(*)
                 FROM tracking_records r
                 JOIN sessions s ON s.id = r.session_id
                 WHERE {filter}
                   AND (?2 IS NULL OR r.scheduled_date >= ?2)
                   AND (?3 IS NULL OR r.scheduled_date <= ?3)
                 GROUP BY r.status"
            ))?;

            let mut rows = stmt.query(params![key, from, to])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                counts.push(StatusCountRow {
                    status: parse_record_status(&status)?,
                    count: count.max(0) as u64,
                });
            }

            Ok(counts)
        })
        .await
    }
}

fn scope_filter(scope: &SummaryScope) -> (&'static str, String) {
    match scope {
        SummaryScope::Session(id) => ("r.session_id = ?1", id.clone()),
        SummaryScope::Schedule(id) => ("s.schedule_id = ?1", id.clone()),
    }
}

fn range_params(
    date_range: Option<(NaiveDate, NaiveDate)>,
) -> (Option<String>, Option<String>) {
    match date_range {
        Some((from, to)) => (Some(format_date(from)), Some(format_date(to))),
        None => (None, None),
    }
}
