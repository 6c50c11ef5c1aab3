pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    FrequencyCode, RecordStatus, ScheduleDefinition, Session, TimeSlot, TrackingRecord,
};
pub use repositories::tracking_records::{StatusCountRow, SummaryScope, SweepCandidate};
