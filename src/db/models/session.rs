//! Observation-window session model.
//!
//! A session is a fixed 30-day reporting window for one patient regimen.
//! Mid-window schedule changes never edit a window in place; the lifecycle
//! manager supersedes the old session and materializes a fresh one.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of calendar days covered by one observation window.
pub const SESSION_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub patient_id: String,
    pub schedule_id: Option<String>,
    pub start_date: NaiveDate,
    /// Always `start_date + 29`; the window spans 30 dates inclusive.
    pub end_date: NaiveDate,
    /// Patient wall-clock offset from UTC, in minutes. Applied only when a
    /// (date, time) pair must be compared against an instant.
    pub tz_offset_minutes: i32,
    pub active: bool,
    /// Set once, by the first taken/late acknowledgment; immutable after.
    pub first_use_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn window_end(start_date: NaiveDate) -> NaiveDate {
        start_date + Duration::days(SESSION_WINDOW_DAYS - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_end_spans_thirty_inclusive_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            Session::window_end(start),
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
        );

        // Month boundary.
        let start = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(
            Session::window_end(start),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }
}
