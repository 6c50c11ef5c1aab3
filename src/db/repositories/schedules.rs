use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_date, format_time, parse_date, parse_datetime, parse_optional_date, parse_time},
    models::{FrequencyCode, ScheduleDefinition, TimeSlot},
};
use crate::error::{EngineError, Result};

fn load_slots(conn: &Connection, schedule_id: &str) -> Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "SELECT slot_time, enabled, label
         FROM schedule_slots
         WHERE schedule_id = ?1
         ORDER BY position ASC",
    )?;

    let mut rows = stmt.query(params![schedule_id])?;
    let mut slots = Vec::new();
    while let Some(row) = rows.next()? {
        let slot_time: String = row.get(0)?;
        let enabled: i64 = row.get(1)?;
        slots.push(TimeSlot {
            time: parse_time(&slot_time, "slot_time")?,
            enabled: enabled != 0,
            label: row.get(2)?,
        });
    }

    Ok(slots)
}

fn replace_slots(tx: &Transaction<'_>, schedule_id: &str, slots: &[TimeSlot]) -> Result<()> {
    tx.execute(
        "DELETE FROM schedule_slots WHERE schedule_id = ?1",
        params![schedule_id],
    )?;

    let mut stmt = tx.prepare(
        "INSERT INTO schedule_slots (id, schedule_id, slot_time, enabled, label, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for (position, slot) in slots.iter().enumerate() {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            schedule_id,
            format_time(slot.time),
            slot.enabled as i64,
            slot.label,
            position as i64,
        ])?;
    }

    Ok(())
}

impl Database {
    pub async fn insert_schedule(&self, schedule: &ScheduleDefinition) -> Result<()> {
        let schedule = schedule.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO schedules
                     (id, patient_id, medication_id, frequency, start_date, end_date, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    schedule.id,
                    schedule.patient_id,
                    schedule.medication_id,
                    schedule.frequency.as_str(),
                    format_date(schedule.start_date),
                    schedule.end_date.map(format_date),
                    schedule.active as i64,
                    schedule.created_at.to_rfc3339(),
                    schedule.updated_at.to_rfc3339(),
                ],
            )?;

            replace_slots(&tx, &schedule.id, &schedule.slots)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> Result<ScheduleDefinition> {
        let schedule_id = schedule_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, patient_id, medication_id, frequency, start_date, end_date, active, created_at, updated_at
                 FROM schedules
                 WHERE id = ?1",
            )?;

            let mut rows = stmt.query(params![schedule_id])?;
            let row = match rows.next()? {
                Some(row) => row,
                None => {
                    return Err(EngineError::not_found(format!(
                        "schedule {schedule_id} does not exist"
                    )))
                }
            };

            let frequency: String = row.get("frequency")?;
            let start_date: String = row.get("start_date")?;
            let end_date: Option<String> = row.get("end_date")?;
            let created_at: String = row.get("created_at")?;
            let updated_at: String = row.get("updated_at")?;
            let active: i64 = row.get("active")?;

            let mut schedule = ScheduleDefinition {
                id: row.get("id")?,
                patient_id: row.get("patient_id")?,
                medication_id: row.get("medication_id")?,
                frequency: FrequencyCode::parse(&frequency)?,
                slots: Vec::new(),
                start_date: parse_date(&start_date, "start_date")?,
                end_date: parse_optional_date(end_date, "end_date")?,
                active: active != 0,
                created_at: parse_datetime(&created_at, "created_at")?,
                updated_at: parse_datetime(&updated_at, "updated_at")?,
            };
            drop(rows);
            drop(stmt);

            schedule.slots = load_slots(conn, &schedule.id)?;
            Ok(schedule)
        })
        .await
    }

    /// Rewrites the frequency together with its slot list in one
    /// transaction; the engine passes regenerated defaults or the caller's
    /// explicit times.
    pub async fn update_schedule_frequency(
        &self,
        schedule_id: &str,
        frequency: FrequencyCode,
        slots: &[TimeSlot],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let schedule_id = schedule_id.to_string();
        let slots = slots.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE schedules
                 SET frequency = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![frequency.as_str(), now.to_rfc3339(), schedule_id],
            )?;

            if updated == 0 {
                return Err(EngineError::not_found(format!(
                    "schedule {schedule_id} does not exist"
                )));
            }

            replace_slots(&tx, &schedule_id, &slots)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Schedules are never hard-deleted; deactivation is the terminal state.
    pub async fn set_schedule_active(
        &self,
        schedule_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let schedule_id = schedule_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE schedules
                 SET active = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![active as i64, now.to_rfc3339(), schedule_id],
            )?;

            if updated == 0 {
                return Err(EngineError::not_found(format!(
                    "schedule {schedule_id} does not exist"
                )));
            }
            Ok(())
        })
        .await
    }
}
