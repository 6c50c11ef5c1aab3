//! Regimen definition models: frequency codes and their time slot catalog.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Canonical placeholder time for regenerated slots (09:00). A regimen whose
/// slots still sit at the placeholder must be given explicit times before a
/// session can be materialized from it (duplicate times fail validation).
pub fn default_slot_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("09:00 is a valid wall-clock time")
}

/// Prescription frequency shorthand; caps how many slots a schedule may hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyCode {
    Qd,
    Bid,
    Tid,
    Qid,
}

impl FrequencyCode {
    pub fn max_doses_per_day(&self) -> usize {
        match self {
            FrequencyCode::Qd => 1,
            FrequencyCode::Bid => 2,
            FrequencyCode::Tid => 3,
            FrequencyCode::Qid => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyCode::Qd => "qd",
            FrequencyCode::Bid => "bid",
            FrequencyCode::Tid => "tid",
            FrequencyCode::Qid => "qid",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "qd" => Ok(FrequencyCode::Qd),
            "bid" => Ok(FrequencyCode::Bid),
            "tid" => Ok(FrequencyCode::Tid),
            "qid" => Ok(FrequencyCode::Qid),
            other => Err(EngineError::validation(format!(
                "unknown frequency code '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub time: NaiveTime,
    pub enabled: bool,
    pub label: Option<String>,
}

impl TimeSlot {
    pub fn new(time: NaiveTime) -> Self {
        Self {
            time,
            enabled: true,
            label: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDefinition {
    pub id: String,
    pub patient_id: String,
    pub medication_id: String,
    pub frequency: FrequencyCode,
    /// Ordered for display; slot order has no scheduling meaning.
    pub slots: Vec<TimeSlot>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleDefinition {
    /// Validates the slot set against the frequency cap. Fewer slots than
    /// the cap are allowed; an active schedule must keep at least one.
    pub fn validate(&self) -> Result<()> {
        let max = self.frequency.max_doses_per_day();
        if self.slots.len() > max {
            return Err(EngineError::validation(format!(
                "{} slots exceed the {} maximum of {max}",
                self.slots.len(),
                self.frequency.as_str(),
            )));
        }
        if self.active && self.slots.is_empty() {
            return Err(EngineError::validation(
                "an active schedule requires at least one time slot",
            ));
        }
        Ok(())
    }

    /// Default slot list regenerated when the frequency changes: one
    /// placeholder slot per dose at [`default_slot_time`], kept until the
    /// caller supplies explicit times.
    pub fn default_slots(frequency: FrequencyCode) -> Vec<TimeSlot> {
        let placeholder = default_slot_time();
        (1..=frequency.max_doses_per_day())
            .map(|n| TimeSlot {
                time: placeholder,
                enabled: true,
                label: Some(format!("Dose {n}")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn schedule_with_slots(frequency: FrequencyCode, times: &[(u32, u32)]) -> ScheduleDefinition {
        let now = Utc::now();
        ScheduleDefinition {
            id: "sched-1".to_string(),
            patient_id: "p1".to_string(),
            medication_id: "med-1".to_string(),
            frequency,
            slots: times
                .iter()
                .map(|&(h, m)| TimeSlot::new(NaiveTime::from_hms_opt(h, m, 0).unwrap()))
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn slot_count_capped_by_frequency() {
        let ok = schedule_with_slots(FrequencyCode::Bid, &[(8, 0), (20, 0)]);
        assert!(ok.validate().is_ok());

        // Fewer slots than the cap are fine.
        let sparse = schedule_with_slots(FrequencyCode::Qid, &[(8, 0)]);
        assert!(sparse.validate().is_ok());

        let too_many = schedule_with_slots(FrequencyCode::Qd, &[(8, 0), (20, 0)]);
        assert!(matches!(
            too_many.validate(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn active_schedule_rejects_empty_slot_set() {
        let mut schedule = schedule_with_slots(FrequencyCode::Bid, &[]);
        assert!(matches!(
            schedule.validate(),
            Err(EngineError::Validation(_))
        ));

        schedule.active = false;
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn default_slots_match_frequency_cardinality() {
        for (frequency, expected) in [
            (FrequencyCode::Qd, 1),
            (FrequencyCode::Bid, 2),
            (FrequencyCode::Tid, 3),
            (FrequencyCode::Qid, 4),
        ] {
            let slots = ScheduleDefinition::default_slots(frequency);
            assert_eq!(slots.len(), expected);
            assert!(slots
                .iter()
                .all(|s| s.time == default_slot_time() && s.enabled));
        }
        assert_eq!(
            ScheduleDefinition::default_slots(FrequencyCode::Bid)[1]
                .label
                .as_deref(),
            Some("Dose 2")
        );
    }

    #[test]
    fn frequency_round_trips_through_strings() {
        for code in ["qd", "bid", "tid", "qid"] {
            assert_eq!(FrequencyCode::parse(code).unwrap().as_str(), code);
        }
        assert!(FrequencyCode::parse("prn").is_err());
    }
}
