//! Recurring-dose adherence tracking engine.
//!
//! Schedules expected medication doses over 30-day observation windows,
//! records intake acknowledgments, reclassifies overdue doses as missed,
//! and derives adherence statistics per patient regimen. Persistence runs
//! on an embedded SQLite worker thread; all engine operations are async,
//! short-lived, and take `now` explicitly so hosts and tests control the
//! clock. Logging goes through the `log` facade; install a logger in the
//! host application.

mod adherence;
mod db;
mod error;
mod tracking;

pub use adherence::{compute_summary, AdherenceSummary, StatusCounts};
pub use db::{
    Database, FrequencyCode, RecordStatus, ScheduleDefinition, Session, StatusCountRow,
    SummaryScope, SweepCandidate, TimeSlot, TrackingRecord,
};
pub use error::{EngineError, Result};
pub use tracking::{SlotSpec, StartSessionRequest, TrackingEngine};
