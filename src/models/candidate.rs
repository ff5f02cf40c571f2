use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::employee::{Department, Position};

/// Closed candidate/interview status set. The legacy Jira-era values
/// `reject`/`rejected` are folded into `declined` at the boundary and never
/// reach storage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "candidate_status", rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    NotHeld,
    Reserve,
    Success,
    #[serde(alias = "reject", alias = "rejected")]
    Declined,
    Canceled,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::NotHeld => "not_held",
            CandidateStatus::Reserve => "reserve",
            CandidateStatus::Success => "success",
            CandidateStatus::Declined => "declined",
            CandidateStatus::Canceled => "canceled",
        }
    }

    pub const ALL: [CandidateStatus; 5] = [
        CandidateStatus::NotHeld,
        CandidateStatus::Reserve,
        CandidateStatus::Success,
        CandidateStatus::Declined,
        CandidateStatus::Canceled,
    ];
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_held" => Ok(CandidateStatus::NotHeld),
            "reserve" => Ok(CandidateStatus::Reserve),
            "success" => Ok(CandidateStatus::Success),
            "declined" | "reject" | "rejected" => Ok(CandidateStatus::Declined),
            "canceled" => Ok(CandidateStatus::Canceled),
            other => Err(format!("unknown candidate status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewSource {
    Jira,
    #[default]
    Crm,
}

fn default_duration_minutes() -> i32 {
    60
}

/// One element of the candidate's ordered interview sequence (stored as a
/// JSONB array; index 0 is the current interview).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i32,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,
    #[serde(default)]
    pub status: CandidateStatus,
    #[serde(default)]
    pub source: InterviewSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_calendar_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_issue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminded: bool,
}

impl Interview {
    pub fn seeded_now(now: DateTime<Utc>) -> Self {
        Self {
            scheduled_at: now,
            duration_minutes: default_duration_minutes(),
            participants: Vec::new(),
            meet_link: None,
            status: CandidateStatus::NotHeld,
            source: InterviewSource::Crm,
            google_calendar_event_id: None,
            jira_issue_id: None,
            notes: None,
            reminded: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub notes: Option<String>,
    pub status: CandidateStatus,
    pub meet_link: Option<String>,
    pub department: Department,
    pub position: Option<Position>,
    pub polygraph_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub polygraph_address: String,
    pub interviews: Json<Vec<Interview>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// The interview at position 0, treated as "the current/next interview".
    pub fn head_interview(&self) -> Option<&Interview> {
        self.interviews.0.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_aliases_normalize_to_declined() {
        let s: CandidateStatus = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(s, CandidateStatus::Declined);
        let s: CandidateStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(s, CandidateStatus::Declined);

        assert_eq!("reject".parse::<CandidateStatus>().unwrap(), CandidateStatus::Declined);
        assert_eq!("rejected".parse::<CandidateStatus>().unwrap(), CandidateStatus::Declined);
    }

    #[test]
    fn canonical_values_round_trip() {
        for status in CandidateStatus::ALL {
            let encoded = serde_json::to_string(&status).unwrap();
            assert_eq!(encoded, format!("\"{}\"", status.as_str()));
            let decoded: CandidateStatus = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, status);
            assert_eq!(status.as_str().parse::<CandidateStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<CandidateStatus>("\"hired\"").is_err());
        assert!("hired".parse::<CandidateStatus>().is_err());
    }

    #[test]
    fn interview_defaults_fill_in() {
        let itw: Interview = serde_json::from_value(serde_json::json!({
            "scheduled_at": "2025-09-08T10:00:00Z",
            "status": "rejected"
        }))
        .unwrap();
        assert_eq!(itw.duration_minutes, 60);
        assert_eq!(itw.status, CandidateStatus::Declined);
        assert_eq!(itw.source, InterviewSource::Crm);
        assert!(!itw.reminded);
        assert!(itw.participants.is_empty());
    }
}
