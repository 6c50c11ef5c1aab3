use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::{self, AdherenceSummary};
use crate::db::{
    helpers::TIME_FORMAT,
    models::{FrequencyCode, RecordStatus, ScheduleDefinition, Session, TimeSlot, TrackingRecord},
    Database, SummaryScope,
};
use crate::error::{EngineError, Result};
use crate::tracking::{materializer, state, sweeper};

/// Offsets beyond UTC±14:00 do not exist on any civil clock.
const MAX_TZ_OFFSET_MINUTES: i32 = 14 * 60;

/// A slot as supplied across the boundary: wall-clock "HH:MM" text plus
/// display metadata, parsed and validated before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSpec {
    pub time: String,
    pub enabled: bool,
    pub label: Option<String>,
}

impl SlotSpec {
    pub fn new(time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            enabled: true,
            label: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub patient_id: String,
    pub schedule_id: Option<String>,
    /// Defaults to "today" on the patient's wall clock when omitted.
    pub start_date: Option<NaiveDate>,
    /// Ad-hoc slot set; when empty, the schedule's slots are used.
    pub slots: Vec<SlotSpec>,
    pub tz_offset_minutes: i32,
}

/// The adherence tracking facade exposed to presentation and notification
/// collaborators. Owns a handle to the persistence worker; cheap to clone.
/// Every operation takes `now` explicitly so callers (and tests) control
/// the clock.
#[derive(Clone)]
pub struct TrackingEngine {
    db: Database,
}

impl TrackingEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens a fresh 30-day observation window for a patient regimen.
    ///
    /// Any session currently active for (patient, schedule) is superseded
    /// first; the new session and its full record set are then created in
    /// one atomic write. If that write fails the supersede stands: the
    /// patient has no active session, and the call is safe to retry.
    pub async fn start_session(
        &self,
        request: StartSessionRequest,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if request.tz_offset_minutes.abs() > MAX_TZ_OFFSET_MINUTES {
            return Err(EngineError::validation(format!(
                "timezone offset {} minutes is outside UTC±14:00",
                request.tz_offset_minutes
            )));
        }

        let slots = self.resolve_slots(&request).await?;
        let start_date = request
            .start_date
            .unwrap_or_else(|| local_today(now, request.tz_offset_minutes));

        let session_id = Uuid::new_v4().to_string();
        let records = materializer::materialize(&session_id, start_date, &slots, now)?;

        let session = Session {
            id: session_id.clone(),
            patient_id: request.patient_id.clone(),
            schedule_id: request.schedule_id.clone(),
            start_date,
            end_date: Session::window_end(start_date),
            tz_offset_minutes: request.tz_offset_minutes,
            active: true,
            first_use_date: None,
            created_at: now,
            updated_at: now,
        };

        let superseded = self
            .db
            .supersede_active_session(&request.patient_id, request.schedule_id.as_deref(), now)
            .await?;
        if superseded > 0 {
            info!(
                "Superseded previous active session for patient {}",
                request.patient_id
            );
        }

        self.db.insert_session_with_records(&session, &records).await?;

        info!(
            "Started session {session_id} for patient {}: {} records over {start_date}..={}",
            request.patient_id,
            records.len(),
            session.end_date
        );

        Ok(session_id)
    }

    /// Manual acknowledgment of one dose. Sets `taken_at` for taken/late/
    /// overtaken, bumps `dose_count` for overtaken, and anchors the
    /// session's `first_use_date` on the first taken/late resolution.
    pub async fn acknowledge(
        &self,
        record_id: &str,
        status: RecordStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TrackingRecord> {
        let record = self.db.get_record(record_id).await?;
        let resolution = state::resolve_acknowledgment(&record, status, now)?;

        self.db
            .update_record_resolution(
                record_id,
                resolution.status,
                resolution.taken_at,
                resolution.dose_count,
                notes,
                now,
            )
            .await?;

        if state::marks_first_use(record.status, resolution.status) {
            let anchored = self
                .db
                .set_first_use_date(&record.session_id, record.scheduled_date, now)
                .await?;
            if anchored {
                info!(
                    "Session {} first use anchored to {}",
                    record.session_id, record.scheduled_date
                );
            }
        }

        self.db.get_record(record_id).await
    }

    /// Updates a dose's notes. Carries the on-write guard: a record that is
    /// still pending past its due instant is persisted as missed rather
    /// than written back stale.
    pub async fn annotate(
        &self,
        record_id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TrackingRecord> {
        let record = self.db.get_record(record_id).await?;
        let session = self.db.get_session(&record.session_id).await?;

        let status =
            sweeper::guarded_status(&record, session.active, session.tz_offset_minutes, now);
        if status != record.status {
            warn!("Record {record_id} was pending past due; persisting as missed");
        }

        self.db
            .update_record_notes(record_id, notes, status, now)
            .await?;
        self.db.get_record(record_id).await
    }

    /// Batch lapse sweep over all active sessions, or one session when
    /// given. Idempotent; returns the number of doses reclassified.
    pub async fn sweep_lapsed(
        &self,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        sweeper::sweep_lapsed(&self.db, session_id, now).await
    }

    /// Every record of a session ordered by (date, time), for calendar and
    /// grid rendering.
    pub async fn get_grid(&self, session_id: &str) -> Result<Vec<TrackingRecord>> {
        self.db.get_session(session_id).await?;
        self.db.get_records_for_session(session_id).await
    }

    /// Raw records for a session or schedule, optionally limited to an
    /// inclusive date range. "Current" and "history" presentations are both
    /// just parameterizations of this one query.
    pub async fn get_records(
        &self,
        scope: SummaryScope,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<TrackingRecord>> {
        self.db.get_records_in_scope(scope, date_range).await
    }

    /// Adherence statistics for a session or a schedule, optionally limited
    /// to an inclusive date range.
    pub async fn get_summary(
        &self,
        scope: SummaryScope,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<AdherenceSummary> {
        let rows = self.db.count_records_by_status(scope, date_range).await?;
        Ok(adherence::summary_from_rows(&rows))
    }

    /// The session currently holding the active slot for (patient,
    /// schedule), if any. Callers that lose a start race re-read through
    /// this before retrying.
    pub async fn get_active_session(
        &self,
        patient_id: &str,
        schedule_id: Option<&str>,
    ) -> Result<Option<Session>> {
        self.db.find_active_session(patient_id, schedule_id).await
    }

    /// Records a regimen assignment. An empty slot list gets the default
    /// placeholder slots for the frequency.
    pub async fn create_schedule(
        &self,
        patient_id: &str,
        medication_id: &str,
        frequency: FrequencyCode,
        slots: Vec<SlotSpec>,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ScheduleDefinition> {
        let slots = if slots.is_empty() {
            ScheduleDefinition::default_slots(frequency)
        } else {
            parse_slot_specs(&slots)?
        };

        let schedule = ScheduleDefinition {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            medication_id: medication_id.to_string(),
            frequency,
            slots,
            start_date,
            end_date: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        schedule.validate()?;

        self.db.insert_schedule(&schedule).await?;
        Ok(schedule)
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> Result<ScheduleDefinition> {
        self.db.get_schedule(schedule_id).await
    }

    /// Changes a regimen's frequency. Without explicit times the slot list
    /// is regenerated at the new cardinality with placeholder defaults.
    pub async fn change_schedule_frequency(
        &self,
        schedule_id: &str,
        frequency: FrequencyCode,
        explicit_slots: Option<Vec<SlotSpec>>,
        now: DateTime<Utc>,
    ) -> Result<ScheduleDefinition> {
        let current = self.db.get_schedule(schedule_id).await?;

        let slots = match explicit_slots {
            Some(specs) => parse_slot_specs(&specs)?,
            None => ScheduleDefinition::default_slots(frequency),
        };

        let candidate = ScheduleDefinition {
            frequency,
            slots: slots.clone(),
            ..current
        };
        candidate.validate()?;

        self.db
            .update_schedule_frequency(schedule_id, frequency, &slots, now)
            .await?;
        self.db.get_schedule(schedule_id).await
    }

    /// Deactivation is the only way a schedule leaves service; nothing is
    /// hard-deleted while sessions reference it.
    pub async fn set_schedule_active(
        &self,
        schedule_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if active {
            let schedule = self.db.get_schedule(schedule_id).await?;
            if schedule.slots.is_empty() {
                return Err(EngineError::validation(
                    "cannot activate a schedule with no time slots",
                ));
            }
        }
        self.db.set_schedule_active(schedule_id, active, now).await
    }

    async fn resolve_slots(&self, request: &StartSessionRequest) -> Result<Vec<TimeSlot>> {
        if !request.slots.is_empty() {
            return parse_slot_specs(&request.slots);
        }

        let schedule_id = request.schedule_id.as_deref().ok_or_else(|| {
            EngineError::validation("a session needs time slots or a schedule to draw them from")
        })?;
        let schedule = self.db.get_schedule(schedule_id).await?;
        Ok(schedule.slots)
    }
}

fn parse_slot_specs(specs: &[SlotSpec]) -> Result<Vec<TimeSlot>> {
    specs
        .iter()
        .map(|spec| {
            let time = NaiveTime::parse_from_str(&spec.time, TIME_FORMAT).map_err(|_| {
                EngineError::validation(format!("malformed slot time '{}'", spec.time))
            })?;
            Ok(TimeSlot {
                time,
                enabled: spec.enabled,
                label: spec.label.clone(),
            })
        })
        .collect()
}

fn local_today(now: DateTime<Utc>, tz_offset_minutes: i32) -> NaiveDate {
    (now + Duration::minutes(i64::from(tz_offset_minutes))).date_naive()
}
