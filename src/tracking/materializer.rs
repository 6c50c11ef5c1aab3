//! Expands a slot set over the fixed 30-day window into concrete pending
//! records, one per enabled slot per date. Pure: persistence (and its
//! all-or-nothing guarantee) is the session repository's job.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::models::{session::SESSION_WINDOW_DAYS, RecordStatus, TimeSlot, TrackingRecord};
use crate::error::{EngineError, Result};

pub fn materialize(
    session_id: &str,
    start_date: NaiveDate,
    slots: &[TimeSlot],
    created_at: DateTime<Utc>,
) -> Result<Vec<TrackingRecord>> {
    let enabled: Vec<&TimeSlot> = slots.iter().filter(|slot| slot.enabled).collect();
    if enabled.is_empty() {
        return Err(EngineError::validation(
            "cannot materialize a session without enabled time slots",
        ));
    }

    let mut seen_times = HashSet::new();
    for slot in &enabled {
        if !seen_times.insert(slot.time) {
            return Err(EngineError::validation(format!(
                "duplicate slot time {} in the enabled slot set",
                slot.time.format("%H:%M"),
            )));
        }
    }

    // Full Cartesian product over the window. Slots already past on the
    // start day are materialized too; they become immediately eligible for
    // the lapse sweep.
    let mut records = Vec::with_capacity(enabled.len() * SESSION_WINDOW_DAYS as usize);
    for day in 0..SESSION_WINDOW_DAYS {
        let date = start_date + Duration::days(day);
        for slot in &enabled {
            records.push(TrackingRecord {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                scheduled_date: date,
                scheduled_time: slot.time,
                status: RecordStatus::Pending,
                taken_at: None,
                dose_count: 0,
                notes: None,
                created_at,
                updated_at: created_at,
            });
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn slot(h: u32, m: u32) -> TimeSlot {
        TimeSlot::new(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn two_slots_yield_sixty_pending_records() {
        let records =
            materialize("sess-1", start(), &[slot(8, 0), slot(20, 0)], Utc::now()).unwrap();

        assert_eq!(records.len(), 60);
        assert!(records
            .iter()
            .all(|r| r.status == RecordStatus::Pending && r.dose_count == 0));
        assert!(records.iter().all(|r| r.taken_at.is_none()));

        let keys: HashSet<_> = records
            .iter()
            .map(|r| (r.scheduled_date, r.scheduled_time))
            .collect();
        assert_eq!(keys.len(), 60, "every (date, time) cell must be unique");
    }

    #[test]
    fn window_covers_thirty_dates_inclusive() {
        let records = materialize("sess-1", start(), &[slot(9, 0)], Utc::now()).unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(records.first().unwrap().scheduled_date, start());
        assert_eq!(
            records.last().unwrap().scheduled_date,
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
        );
    }

    #[test]
    fn disabled_slots_are_skipped() {
        let mut evening = slot(20, 0);
        evening.enabled = false;

        let records =
            materialize("sess-1", start(), &[slot(8, 0), evening], Utc::now()).unwrap();
        assert_eq!(records.len(), 30);
        assert!(records
            .iter()
            .all(|r| r.scheduled_time == NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
    }

    #[test]
    fn empty_or_fully_disabled_slot_set_is_rejected() {
        assert!(matches!(
            materialize("sess-1", start(), &[], Utc::now()),
            Err(EngineError::Validation(_))
        ));

        let mut disabled = slot(8, 0);
        disabled.enabled = false;
        assert!(matches!(
            materialize("sess-1", start(), &[disabled], Utc::now()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_enabled_times_are_rejected_before_any_expansion() {
        let result = materialize("sess-1", start(), &[slot(9, 0), slot(9, 0)], Utc::now());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }
}
