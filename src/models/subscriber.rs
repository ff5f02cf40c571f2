use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Notification recipient. Created on the first `/start` opt-in, never
/// hard-deleted; delivery is controlled by `enabled`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
