use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::double_option;
use crate::models::employee::{Department, Position};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateEmployeePayload {
    #[validate(length(min = 1))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<Department>,
    #[serde(default, deserialize_with = "double_option")]
    pub position: Option<Option<Position>>,
    pub notes: Option<String>,
    pub hired_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub birthday_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub terminated_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateEmployeePayload {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.position.is_none()
            && self.notes.is_none()
            && self.hired_at.is_none()
            && self.birthday_at.is_none()
            && self.terminated_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeListResponse {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<crate::models::employee::Employee>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn birthday_can_be_cleared_with_null() {
        let p: UpdateEmployeePayload = serde_json::from_str(r#"{"birthday_at":null}"#).unwrap();
        assert_eq!(p.birthday_at, Some(None));
        assert!(!p.is_empty());

        let p: UpdateEmployeePayload = serde_json::from_str("{}").unwrap();
        assert!(p.is_empty());
    }
}
