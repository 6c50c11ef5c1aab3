pub mod engine;
pub mod materializer;
pub mod state;
pub mod sweeper;

pub use engine::{SlotSpec, StartSessionRequest, TrackingEngine};
