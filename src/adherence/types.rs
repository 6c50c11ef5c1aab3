use serde::{Deserialize, Serialize};

/// Per-status tally of a record set. Purely additive; the summary is
/// derived from these counts and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub taken: u64,
    pub missed: u64,
    pub late: u64,
    pub overtaken: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.taken + self.missed + self.late + self.overtaken
    }
}

/// Derived adherence statistics for one record set. `adherence_rate` is
/// `None` when the set is empty; "no data" is not "zero adherence".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceSummary {
    pub total: u64,
    pub taken: u64,
    pub missed: u64,
    pub late: u64,
    pub overtaken: u64,
    pub adherence_rate: Option<f64>,
}
