use chrono_tz::Tz;

use crate::models::employee::Employee;
use crate::utils::time::local_month_day;

/// Employees whose birthday's local month-day equals the target key.
pub fn birthday_matches(employees: &[Employee], target: (u32, u32), tz: Tz) -> Vec<&Employee> {
    employees
        .iter()
        .filter(|e| {
            e.birthday_at
                .map(|b| local_month_day(b, tz) == target)
                .unwrap_or(false)
        })
        .collect()
}

fn display_name(employee: &Employee) -> &str {
    if employee.full_name.is_empty() {
        if employee.email.is_empty() {
            "Сотрудник"
        } else {
            employee.email.as_str()
        }
    } else {
        employee.full_name.as_str()
    }
}

/// One aggregated digest per firing, delivered once per subscriber.
pub fn birthday_digest(matches: &[&Employee], days_ahead: u64) -> String {
    let list = matches
        .iter()
        .map(|e| format!("• {}", display_name(e)))
        .collect::<Vec<_>>()
        .join("\n");
    if days_ahead == 0 {
        format!("🎉 Сегодня день рождения:\n{}", list)
    } else {
        format!("🎂 Через {} дн. день рождения:\n{}", days_ahead, list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::Department;
    use chrono::{DateTime, Utc};
    use chrono_tz::Europe::Kyiv;
    use uuid::Uuid;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn employee(name: &str, birthday: Option<&str>) -> Employee {
        let now = utc("2025-01-01T00:00:00Z");
        Employee {
            id: Uuid::new_v4(),
            candidate_id: None,
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: String::new(),
            birthday_at: birthday.map(utc),
            department: Department::Gambling,
            position: None,
            notes: String::new(),
            hired_at: now,
            terminated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn matches_by_local_month_day_ignoring_year() {
        let staff = vec![
            employee("Anna", Some("1990-09-08T12:00:00Z")),
            employee("Boris", Some("1985-09-09T12:00:00Z")),
            employee("Clara", None),
        ];
        let matched = birthday_matches(&staff, (9, 8), Kyiv);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].full_name, "Anna");
    }

    #[test]
    fn late_evening_birth_instant_lands_on_next_local_day() {
        // 23:00 UTC is already the next calendar day in Kyiv
        let staff = vec![employee("Night Owl", Some("1990-09-07T23:00:00Z"))];
        assert_eq!(birthday_matches(&staff, (9, 7), Kyiv).len(), 0);
        assert_eq!(birthday_matches(&staff, (9, 8), Kyiv).len(), 1);
    }

    #[test]
    fn digest_aggregates_all_matches() {
        let staff = vec![
            employee("Anna", Some("1990-09-08T12:00:00Z")),
            employee("Boris", Some("1985-09-08T12:00:00Z")),
        ];
        let matched = birthday_matches(&staff, (9, 8), Kyiv);
        let today = birthday_digest(&matched, 0);
        assert!(today.starts_with("🎉 Сегодня день рождения:"));
        assert!(today.contains("• Anna"));
        assert!(today.contains("• Boris"));

        let upcoming = birthday_digest(&matched, 7);
        assert!(upcoming.starts_with("🎂 Через 7 дн. день рождения:"));
    }
}
