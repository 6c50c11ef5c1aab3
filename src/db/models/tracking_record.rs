use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Taken,
    Missed,
    Late,
    Overtaken,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Taken => "taken",
            RecordStatus::Missed => "missed",
            RecordStatus::Late => "late",
            RecordStatus::Overtaken => "overtaken",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, RecordStatus::Pending)
    }
}

/// One expected dose: a (session, date, time-of-day) cell in the tracking
/// grid. Wall-clock components are stored unconverted; the patient offset
/// lives on the session and is applied only at comparison time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub id: String,
    pub session_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: RecordStatus,
    pub taken_at: Option<DateTime<Utc>>,
    /// Incremented on every `overtaken` acknowledgment, never decremented.
    pub dose_count: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_boundary_contract() {
        for (status, expected) in [
            (RecordStatus::Pending, "pending"),
            (RecordStatus::Taken, "taken"),
            (RecordStatus::Missed, "missed"),
            (RecordStatus::Late, "late"),
            (RecordStatus::Overtaken, "overtaken"),
        ] {
            assert_eq!(status.as_str(), expected);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{expected}\"")
            );
        }
    }

    #[test]
    fn serialized_record_uses_camel_case_fields() {
        let record = TrackingRecord {
            id: "rec-1".to_string(),
            session_id: "sess-1".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            status: RecordStatus::Pending,
            taken_at: None,
            dose_count: 0,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sessionId"], "sess-1");
        assert_eq!(json["scheduledDate"], "2024-01-01");
        assert!(json["takenAt"].is_null());
        assert_eq!(json["doseCount"], 0);
        assert!(json["notes"].is_null());
    }
}
