use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::models::candidate::{Candidate, Interview};

/// Symmetric match window centered on `now + lead`. Sized so consecutive
/// poll ticks cannot leave a gap, while staying narrow enough that an
/// interview a full minute off the lead does not match.
pub fn reminder_window(
    now: DateTime<Utc>,
    lead: Duration,
    half_width: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let center = now + lead;
    (center - half_width, center + half_width)
}

pub fn interview_reminder_text(candidate: &Candidate, interview: &Interview, tz: Tz) -> String {
    let who = if candidate.full_name.is_empty() {
        candidate.email.as_str()
    } else {
        candidate.full_name.as_str()
    };
    let when = interview
        .scheduled_at
        .with_timezone(&tz)
        .format("%d.%m.%Y %H:%M");
    let mut text = format!("🕘 Через час интервью: <b>{}</b>\nКогда: {}", who, when);
    if let Some(link) = &interview.meet_link {
        text.push_str(&format!("\nСсылка: {}", link));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::CandidateStatus;
    use crate::models::employee::Department;
    use chrono_tz::Europe::Kyiv;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn in_window(window: (DateTime<Utc>, DateTime<Utc>), at: DateTime<Utc>) -> bool {
        window.0 <= at && at <= window.1
    }

    #[test]
    fn window_boundaries_around_one_hour_lead() {
        let now = utc("2025-09-08T10:00:00Z");
        let window = reminder_window(now, Duration::minutes(60), Duration::seconds(45));

        // sixty-one minutes out misses, sixty and a half matches
        assert!(!in_window(window, now + Duration::minutes(61)));
        assert!(in_window(window, now + Duration::minutes(60) + Duration::seconds(30)));
        assert!(in_window(window, now + Duration::minutes(60)));
        assert!(in_window(window, now + Duration::minutes(60) - Duration::seconds(45)));
        assert!(!in_window(window, now + Duration::minutes(60) - Duration::seconds(46)));
    }

    #[test]
    fn consecutive_ticks_cover_the_lead_line_without_gaps() {
        let poll = Duration::seconds(30);
        let half = Duration::seconds(45);
        let t0 = utc("2025-09-08T10:00:00Z");
        let (_, first_end) = reminder_window(t0, Duration::minutes(60), half);
        let (second_start, _) = reminder_window(t0 + poll, Duration::minutes(60), half);
        assert!(second_start <= first_end);
    }

    #[test]
    fn reminder_text_prefers_name_and_includes_link() {
        let scheduled = utc("2025-09-08T10:00:00Z");
        let interview = Interview {
            meet_link: Some("https://meet.example/xyz".to_string()),
            ..Interview::seeded_now(scheduled)
        };
        let candidate = Candidate {
            id: Uuid::new_v4(),
            full_name: "Иван Петров".to_string(),
            email: "ivan@example.com".to_string(),
            phone: String::new(),
            notes: None,
            status: CandidateStatus::NotHeld,
            meet_link: None,
            department: Department::Gambling,
            position: None,
            polygraph_at: None,
            accepted_at: None,
            declined_at: None,
            canceled_at: None,
            polygraph_address: String::new(),
            interviews: Json(vec![interview.clone()]),
            created_at: scheduled,
            updated_at: scheduled,
        };

        let text = interview_reminder_text(&candidate, &interview, Kyiv);
        assert!(text.contains("Иван Петров"));
        // 10:00 UTC in September is 13:00 in Kyiv
        assert!(text.contains("08.09.2025 13:00"));
        assert!(text.contains("https://meet.example/xyz"));
    }
}
