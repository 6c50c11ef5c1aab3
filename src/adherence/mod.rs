//! Adherence analytics derived from tracking records.
//!
//! Summaries carry no hidden counters: recomputing from the raw record set
//! always matches folding the store's aggregate rows, and both paths go
//! through [`summary_from_counts`].

mod types;

pub use types::{AdherenceSummary, StatusCounts};

use crate::db::models::{RecordStatus, TrackingRecord};
use crate::db::StatusCountRow;

/// Tallies a raw record slice and folds it into a summary.
pub fn compute_summary(records: &[TrackingRecord]) -> AdherenceSummary {
    let mut counts = StatusCounts::default();
    for record in records {
        add_status(&mut counts, record.status, 1);
    }
    summary_from_counts(counts)
}

/// Folds aggregate GROUP BY rows into a summary.
pub fn summary_from_rows(rows: &[StatusCountRow]) -> AdherenceSummary {
    let mut counts = StatusCounts::default();
    for row in rows {
        add_status(&mut counts, row.status, row.count);
    }
    summary_from_counts(counts)
}

/// `adherence_rate = taken / total × 100`, rounded to two decimals.
/// Overtaken doses count toward the total but not the numerator; whether
/// they should ever credit the rate is an open clinical question, so the
/// conservative reading stands.
pub fn summary_from_counts(counts: StatusCounts) -> AdherenceSummary {
    let total = counts.total();
    let adherence_rate = if total > 0 {
        Some(round2(counts.taken as f64 / total as f64 * 100.0))
    } else {
        None
    };

    AdherenceSummary {
        total,
        taken: counts.taken,
        missed: counts.missed,
        late: counts.late,
        overtaken: counts.overtaken,
        adherence_rate,
    }
}

fn add_status(counts: &mut StatusCounts, status: RecordStatus, n: u64) {
    match status {
        RecordStatus::Pending => counts.pending += n,
        RecordStatus::Taken => counts.taken += n,
        RecordStatus::Missed => counts.missed += n,
        RecordStatus::Late => counts.late += n,
        RecordStatus::Overtaken => counts.overtaken += n,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn record(status: RecordStatus) -> TrackingRecord {
        let now = Utc::now();
        TrackingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "sess-1".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            status,
            taken_at: None,
            dose_count: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn records(taken: usize, missed: usize, late: usize, overtaken: usize) -> Vec<TrackingRecord> {
        let mut out = Vec::new();
        out.extend((0..taken).map(|_| record(RecordStatus::Taken)));
        out.extend((0..missed).map(|_| record(RecordStatus::Missed)));
        out.extend((0..late).map(|_| record(RecordStatus::Late)));
        out.extend((0..overtaken).map(|_| record(RecordStatus::Overtaken)));
        out
    }

    #[test]
    fn forty_of_sixty_taken_rounds_to_66_67() {
        let summary = compute_summary(&records(40, 10, 5, 5));

        assert_eq!(summary.total, 60);
        assert_eq!(summary.taken, 40);
        assert_eq!(summary.missed, 10);
        assert_eq!(summary.late, 5);
        assert_eq!(summary.overtaken, 5);
        assert_eq!(summary.adherence_rate, Some(66.67));
    }

    #[test]
    fn empty_set_has_no_rate() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.adherence_rate, None);
    }

    #[test]
    fn zero_taken_is_a_zero_rate_not_none() {
        let summary = compute_summary(&records(0, 3, 0, 0));
        assert_eq!(summary.adherence_rate, Some(0.0));
    }

    #[test]
    fn pending_records_count_toward_total_only() {
        let mut set = records(1, 0, 0, 0);
        set.push(record(RecordStatus::Pending));
        set.push(record(RecordStatus::Pending));
        set.push(record(RecordStatus::Pending));

        let summary = compute_summary(&set);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.adherence_rate, Some(25.0));
    }

    #[test]
    fn raw_recompute_matches_aggregate_fold() {
        let set = records(7, 2, 1, 3);
        let rows = [
            StatusCountRow {
                status: RecordStatus::Taken,
                count: 7,
            },
            StatusCountRow {
                status: RecordStatus::Missed,
                count: 2,
            },
            StatusCountRow {
                status: RecordStatus::Late,
                count: 1,
            },
            StatusCountRow {
                status: RecordStatus::Overtaken,
                count: 3,
            },
        ];

        assert_eq!(compute_summary(&set), summary_from_rows(&rows));
    }
}
