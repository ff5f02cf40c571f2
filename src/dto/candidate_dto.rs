use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use validator::Validate;

use crate::dto::double_option;
use crate::models::candidate::{CandidateStatus, Interview, InterviewSource};
use crate::models::employee::{Department, Position};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InterviewPayload {
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i32>,
    pub participants: Option<Vec<String>>,
    #[validate(url)]
    pub meet_link: Option<String>,
    pub status: Option<CandidateStatus>,
    pub source: Option<InterviewSource>,
    pub google_calendar_event_id: Option<String>,
    pub jira_issue_id: Option<String>,
    pub notes: Option<String>,
}

impl InterviewPayload {
    pub fn into_interview(self) -> Interview {
        Interview {
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes.unwrap_or(60),
            participants: self.participants.unwrap_or_default(),
            meet_link: self.meet_link,
            status: self.status.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            google_calendar_event_id: self.google_calendar_event_id,
            jira_issue_id: self.jira_issue_id,
            notes: self.notes,
            reminded: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCandidatePayload {
    #[validate(length(min = 1))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub department: Option<Department>,
    pub position: Option<Position>,
    pub status: Option<CandidateStatus>,
    /// Optional first interview, becomes the head of the sequence.
    #[validate(nested)]
    pub interview: Option<InterviewPayload>,
    pub polygraph_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub polygraph_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCandidatePayload {
    pub status: Option<CandidateStatus>,
    #[validate(url)]
    pub meet_link: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub department: Option<Department>,
    #[serde(default, deserialize_with = "position_patch")]
    pub position: Option<Option<Position>>,
    #[validate(nested)]
    pub interviews: Option<Vec<InterviewPayload>>,
    #[serde(default, deserialize_with = "double_option")]
    pub polygraph_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub accepted_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub declined_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub canceled_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub polygraph_address: Option<Option<String>>,
    #[validate(length(min = 1))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

impl UpdateCandidatePayload {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.meet_link.is_none()
            && self.phone.is_none()
            && self.notes.is_none()
            && self.department.is_none()
            && self.position.is_none()
            && self.interviews.is_none()
            && self.polygraph_at.is_none()
            && self.accepted_at.is_none()
            && self.declined_at.is_none()
            && self.canceled_at.is_none()
            && self.polygraph_address.is_none()
            && self.full_name.is_none()
            && self.email.is_none()
    }

    /// True for the fast path: a body whose only field is `meet_link`.
    pub fn is_meet_link_only(&self) -> bool {
        self.meet_link.is_some()
            && self.status.is_none()
            && self.phone.is_none()
            && self.notes.is_none()
            && self.department.is_none()
            && self.position.is_none()
            && self.interviews.as_ref().map_or(true, |i| i.is_empty())
            && self.polygraph_at.is_none()
            && self.accepted_at.is_none()
            && self.declined_at.is_none()
            && self.canceled_at.is_none()
            && self.polygraph_address.is_none()
            && self.full_name.is_none()
            && self.email.is_none()
    }
}

/// Position patches historically arrive as a value, `null`, or `""`; the
/// empty string means "clear" like an explicit null.
fn position_patch<'de, D>(de: D) -> Result<Option<Option<Position>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<JsonValue>::deserialize(de)?;
    match raw {
        None => Ok(Some(None)),
        Some(JsonValue::String(s)) if s.is_empty() => Ok(Some(None)),
        Some(other) => serde_json::from_value::<Position>(other)
            .map(|p| Some(Some(p)))
            .map_err(de::Error::custom),
    }
}

/// Narrow payload for the status endpoint: the target status plus optional
/// explicit event timestamps that override the derived "now".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: CandidateStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateListResponse {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<crate::models::candidate::Candidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyEvents {
    pub month: String,
    pub polygraph: i64,
    pub accepted: i64,
    pub declined: i64,
    pub canceled: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FirstTouches {
    pub month: String,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateMetricsResponse {
    pub current: BTreeMap<String, i64>,
    pub monthly: Vec<MonthlyEvents>,
    pub first_touches: Vec<FirstTouches>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotItem {
    pub month: String,
    #[serde(flatten)]
    pub counts: BTreeMap<String, i64>,
}
