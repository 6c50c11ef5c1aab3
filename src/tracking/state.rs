//! Pure transition logic for the per-dose status lifecycle.
//!
//! `pending` is the initial state; manual acknowledgment may move any state
//! to `taken`, `missed`, `late`, or `overtaken`. The automatic
//! `pending → missed` lapse belongs exclusively to the sweeper. Nothing
//! here touches storage or a live clock; callers thread `now` through.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::db::models::{RecordStatus, TrackingRecord};
use crate::error::{EngineError, Result};

/// Outcome of a manual acknowledgment, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: RecordStatus,
    pub taken_at: Option<DateTime<Utc>>,
    pub dose_count: u32,
}

pub fn resolve_acknowledgment(
    record: &TrackingRecord,
    target: RecordStatus,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    match target {
        RecordStatus::Pending => Err(EngineError::validation(
            "a record cannot be acknowledged back to pending",
        )),
        RecordStatus::Taken | RecordStatus::Late => Ok(Resolution {
            status: target,
            taken_at: Some(now),
            dose_count: record.dose_count,
        }),
        // Not a dead end: every repeated acknowledgment of an already
        // resolved dose lands here and bumps the count again.
        RecordStatus::Overtaken => Ok(Resolution {
            status: RecordStatus::Overtaken,
            taken_at: Some(now),
            dose_count: record.dose_count.saturating_add(1),
        }),
        RecordStatus::Missed => Ok(Resolution {
            status: RecordStatus::Missed,
            taken_at: record.taken_at,
            dose_count: record.dose_count,
        }),
    }
}

/// Resolves stored wall-clock components against the patient offset. The
/// conversion happens only here, at comparison time; stored records keep
/// their wall-clock form so an offset change never rewrites them.
pub fn due_instant(
    scheduled_date: NaiveDate,
    scheduled_time: NaiveTime,
    tz_offset_minutes: i32,
) -> DateTime<Utc> {
    let local = scheduled_date.and_time(scheduled_time);
    Utc.from_utc_datetime(&(local - Duration::minutes(i64::from(tz_offset_minutes))))
}

/// Strict `<`: a dose whose instant equals `now` exactly is not yet lapsed.
pub fn is_lapsed(
    status: RecordStatus,
    scheduled_date: NaiveDate,
    scheduled_time: NaiveTime,
    tz_offset_minutes: i32,
    now: DateTime<Utc>,
) -> bool {
    !status.is_resolved()
        && due_instant(scheduled_date, scheduled_time, tz_offset_minutes) < now
}

/// Whether this transition is the session's first use: the first
/// pending → taken/late acknowledgment anchors `first_use_date`.
pub fn marks_first_use(previous: RecordStatus, target: RecordStatus) -> bool {
    previous == RecordStatus::Pending
        && matches!(target, RecordStatus::Taken | RecordStatus::Late)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: RecordStatus, dose_count: u32) -> TrackingRecord {
        let now = Utc::now();
        TrackingRecord {
            id: "rec-1".to_string(),
            session_id: "sess-1".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            status,
            taken_at: None,
            dose_count,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn instant(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn taken_and_late_stamp_acknowledgment_time() {
        let now = instant("2024-01-01T08:05:00Z");
        for target in [RecordStatus::Taken, RecordStatus::Late] {
            let resolution =
                resolve_acknowledgment(&record(RecordStatus::Pending, 0), target, now).unwrap();
            assert_eq!(resolution.status, target);
            assert_eq!(resolution.taken_at, Some(now));
            assert_eq!(resolution.dose_count, 0);
        }
    }

    #[test]
    fn overtaken_increments_dose_count_each_time() {
        let now = Utc::now();
        let first =
            resolve_acknowledgment(&record(RecordStatus::Taken, 0), RecordStatus::Overtaken, now)
                .unwrap();
        assert_eq!(first.dose_count, 1);

        let again = resolve_acknowledgment(
            &record(RecordStatus::Overtaken, 3),
            RecordStatus::Overtaken,
            now,
        )
        .unwrap();
        assert_eq!(again.dose_count, 4);
        assert_eq!(again.taken_at, Some(now));
    }

    #[test]
    fn manual_missed_leaves_taken_at_untouched() {
        let earlier = instant("2024-01-01T08:05:00Z");
        let mut rec = record(RecordStatus::Taken, 0);
        rec.taken_at = Some(earlier);

        let resolution =
            resolve_acknowledgment(&rec, RecordStatus::Missed, Utc::now()).unwrap();
        assert_eq!(resolution.taken_at, Some(earlier));
    }

    #[test]
    fn reverting_to_pending_is_rejected() {
        let result = resolve_acknowledgment(
            &record(RecordStatus::Taken, 0),
            RecordStatus::Pending,
            Utc::now(),
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn due_instant_applies_patient_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

        // UTC+1 patient: 08:00 wall clock is 07:00Z.
        assert_eq!(
            due_instant(date, time, 60),
            instant("2024-01-01T07:00:00Z")
        );
        // UTC-5: 08:00 wall clock is 13:00Z.
        assert_eq!(
            due_instant(date, time, -300),
            instant("2024-01-01T13:00:00Z")
        );
    }

    #[test]
    fn lapse_boundary_is_strictly_past() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let exactly_due = instant("2024-01-01T08:00:00Z");

        assert!(!is_lapsed(RecordStatus::Pending, date, time, 0, exactly_due));
        assert!(is_lapsed(
            RecordStatus::Pending,
            date,
            time,
            0,
            exactly_due + Duration::seconds(1)
        ));
        // Resolved records never lapse.
        assert!(!is_lapsed(
            RecordStatus::Taken,
            date,
            time,
            0,
            exactly_due + Duration::days(1)
        ));
    }

    #[test]
    fn first_use_anchors_only_on_taken_or_late_from_pending() {
        assert!(marks_first_use(RecordStatus::Pending, RecordStatus::Taken));
        assert!(marks_first_use(RecordStatus::Pending, RecordStatus::Late));
        assert!(!marks_first_use(RecordStatus::Pending, RecordStatus::Missed));
        assert!(!marks_first_use(
            RecordStatus::Pending,
            RecordStatus::Overtaken
        ));
        assert!(!marks_first_use(RecordStatus::Taken, RecordStatus::Taken));
    }
}
