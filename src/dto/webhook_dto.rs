use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::candidate::{CandidateStatus, Interview, InterviewSource};

/// Interview event pushed by the Jira automation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JiraInterviewPayload {
    #[validate(length(min = 1))]
    pub issue_id: String,
    pub summary: Option<String>,
    #[validate(nested)]
    pub candidate: JiraCandidate,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[validate(url)]
    pub meet_link: Option<String>,
    pub google_calendar_event_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JiraCandidate {
    #[validate(email)]
    pub email: String,
    pub full_name: Option<String>,
}

impl JiraInterviewPayload {
    pub fn build_interview(&self) -> Interview {
        Interview {
            scheduled_at: self.scheduled_at,
            duration_minutes: 60,
            participants: self.participants.clone(),
            meet_link: self.meet_link.clone(),
            status: CandidateStatus::NotHeld,
            source: InterviewSource::Jira,
            google_calendar_event_id: self.google_calendar_event_id.clone(),
            jira_issue_id: Some(self.issue_id.clone()),
            notes: self.summary.clone(),
            reminded: false,
        }
    }
}
