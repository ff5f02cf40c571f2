use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "department_kind")]
pub enum Department {
    #[default]
    Gambling,
    Sweeps,
    Search,
    Vitehi,
    Tech,
    TechaDeals,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "position_kind")]
pub enum Position {
    Head,
    TeamLead,
    Buyer,
    Designer,
    Accountant,
    Administrator,
    #[serde(rename = "CTO")]
    #[sqlx(rename = "CTO")]
    Cto,
    Translator,
    Frontend,
    FarmerTech,
}

/// Department/position pairing is advisory, not a hard invariant: a missing
/// side always passes, and an unknown pairing only downgrades to a warning
/// at the call sites.
pub fn is_valid_position(department: Option<Department>, position: Option<Position>) -> bool {
    let (Some(department), Some(position)) = (department, position) else {
        return true;
    };
    let allowed: &[Position] = match department {
        Department::Gambling | Department::Sweeps | Department::Search | Department::TechaDeals => &[
            Position::Head,
            Position::TeamLead,
            Position::Buyer,
            Position::Designer,
        ],
        Department::Admin => &[Position::Accountant, Position::Administrator],
        Department::Vitehi => &[],
        Department::Tech => &[
            Position::Cto,
            Position::Translator,
            Position::Frontend,
            Position::FarmerTech,
        ],
    };
    allowed.contains(&position)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub candidate_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birthday_at: Option<DateTime<Utc>>,
    pub department: Department,
    pub position: Option<Position>,
    pub notes: String,
    pub hired_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
