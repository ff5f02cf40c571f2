use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEDUP_SCOPE: &str = "crm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Meet1h,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Meet1h => "meet_1h",
        }
    }
}

/// Composite dedup key. Creating the row behind this key is the atomic
/// claim that authorizes exactly one notification round; the uniqueness
/// constraint, not read consistency, is what makes delivery at-most-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKey {
    pub candidate_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub kind: NotificationKind,
}

impl DedupKey {
    pub fn meet_1h(candidate_id: Uuid, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            candidate_id,
            scheduled_at,
            kind: NotificationKind::Meet1h,
        }
    }
}
