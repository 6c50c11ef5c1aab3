pub mod schedule;
pub mod session;
pub mod tracking_record;

pub use schedule::{default_slot_time, FrequencyCode, ScheduleDefinition, TimeSlot};
pub use session::Session;
pub use tracking_record::{RecordStatus, TrackingRecord};
