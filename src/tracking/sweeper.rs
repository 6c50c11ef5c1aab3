//! Reclassifies overdue pending doses as missed.
//!
//! Two modes share one predicate: the on-write guard consulted before any
//! record write, and the batch sweep over all pending records in active
//! sessions. Both take `now` from the caller; nothing here reads a clock.

use chrono::{DateTime, Utc};
use log::info;

use crate::db::{Database, RecordStatus, TrackingRecord};
use crate::error::Result;
use crate::tracking::state;

/// On-write guard: the status a record should be persisted with. A still
/// pending record whose due instant is already past goes down as `missed`;
/// anything else keeps its current status. Inactive sessions are left to
/// their superseding window.
pub fn guarded_status(
    record: &TrackingRecord,
    session_active: bool,
    tz_offset_minutes: i32,
    now: DateTime<Utc>,
) -> RecordStatus {
    if session_active
        && state::is_lapsed(
            record.status,
            record.scheduled_date,
            record.scheduled_time,
            tz_offset_minutes,
            now,
        )
    {
        RecordStatus::Missed
    } else {
        record.status
    }
}

/// Batch sweep. Each transition is its own conditional write (`WHERE
/// status = 'pending'`), so a concurrent manual acknowledgment is never
/// overwritten and an interrupted run keeps its partial progress; re-running
/// is a no-op once nothing remains overdue. Returns the transition count.
pub async fn sweep_lapsed(
    db: &Database,
    session_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<usize> {
    if let Some(id) = session_id {
        // Surfaces NotFound for a bogus target before any scanning.
        db.get_session(id).await?;
    }

    let candidates = db.get_sweep_candidates(session_id).await?;

    let mut transitioned = 0usize;
    for candidate in candidates {
        let due = state::due_instant(
            candidate.scheduled_date,
            candidate.scheduled_time,
            candidate.tz_offset_minutes,
        );
        if due >= now {
            continue;
        }
        if db.mark_missed_if_pending(&candidate.record_id, now).await? {
            transitioned += 1;
        }
    }

    if transitioned > 0 {
        info!("Lapse sweep reclassified {transitioned} overdue doses as missed");
    }

    Ok(transitioned)
}
