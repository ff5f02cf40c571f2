use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dto::candidate_dto::{
    CandidateListResponse, CandidateMetricsResponse, CreateCandidatePayload, FirstTouches,
    MonthlyEvents, SnapshotItem, UpdateCandidatePayload, UpdateStatusPayload,
};
use crate::dto::Pagination;
use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, CandidateStatus, Interview};
use crate::models::employee::{is_valid_position, Employee};
use crate::utils::time::utc_noon_of;

/// Event-timestamp assignments derived from a status change. `Some(None)`
/// clears the column, `Some(Some(t))` sets it, `None` leaves it to the rest
/// of the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSideEffects {
    pub polygraph_at: Option<Option<DateTime<Utc>>>,
    pub accepted_at: Option<Option<DateTime<Utc>>>,
    pub declined_at: Option<Option<DateTime<Utc>>>,
    pub canceled_at: Option<Option<DateTime<Utc>>>,
}

/// Derives the timestamp side effects of assigning `status`. Explicitly
/// supplied event instants win over "now"; conflicting timestamps from any
/// earlier state are cleared so at most one of accepted/declined/canceled
/// survives.
pub fn derive_status_side_effects(
    status: CandidateStatus,
    explicit_accepted: Option<DateTime<Utc>>,
    explicit_declined: Option<DateTime<Utc>>,
    explicit_canceled: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StatusSideEffects {
    let mut fx = StatusSideEffects::default();
    match status {
        CandidateStatus::Success => {
            fx.accepted_at = Some(Some(explicit_accepted.unwrap_or(now)));
            fx.declined_at = Some(None);
            fx.canceled_at = Some(None);
        }
        CandidateStatus::Declined => {
            fx.declined_at = Some(Some(explicit_declined.unwrap_or(now)));
            fx.accepted_at = Some(None);
            fx.canceled_at = Some(None);
        }
        CandidateStatus::Canceled => {
            fx.canceled_at = Some(Some(explicit_canceled.unwrap_or(now)));
            fx.accepted_at = Some(None);
            fx.declined_at = Some(None);
        }
        CandidateStatus::Reserve => {}
        CandidateStatus::NotHeld => {
            fx.polygraph_at = Some(None);
            fx.accepted_at = Some(None);
            fx.declined_at = Some(None);
            fx.canceled_at = Some(None);
        }
    }
    fx
}

fn patched<T: Clone>(current: &Option<T>, patch: &Option<Option<T>>) -> Option<T> {
    match patch {
        None => current.clone(),
        Some(value) => value.clone(),
    }
}

fn overridden<T: Clone>(value: Option<T>, fx: &Option<Option<T>>) -> Option<T> {
    match fx {
        None => value,
        Some(forced) => forced.clone(),
    }
}

#[derive(Clone)]
pub struct CandidateService {
    pool: PgPool,
}

impl CandidateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        let candidate =
            sqlx::query_as::<_, Candidate>(r#"SELECT * FROM candidates WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(candidate)
    }

    pub async fn list_candidates(&self, pagination: Pagination) -> Result<CandidateListResponse> {
        let (page, page_size) = pagination.clamped();
        let items = sqlx::query_as::<_, Candidate>(
            r#"SELECT * FROM candidates ORDER BY created_at DESC LIMIT $1 OFFSET $2"#,
        )
        .bind(page_size)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM candidates"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(CandidateListResponse { page, page_size, total, items })
    }

    pub async fn create_candidate(&self, payload: CreateCandidatePayload) -> Result<Candidate> {
        let now = Utc::now();
        let status = payload.status.unwrap_or_default();

        if !is_valid_position(payload.department, payload.position) {
            tracing::warn!(
                department = ?payload.department,
                position = ?payload.position,
                "unusual department/position pairing on candidate create"
            );
        }

        let mut interviews: Vec<Interview> = payload
            .interview
            .map(|i| vec![i.into_interview()])
            .unwrap_or_default();
        // "in progress" with no event yet: seed the head interview at "now"
        if status == CandidateStatus::NotHeld && interviews.is_empty() {
            interviews.push(Interview::seeded_now(now));
        }

        let fx = derive_status_side_effects(
            status,
            payload.accepted_at,
            payload.declined_at,
            payload.canceled_at,
            now,
        );
        let polygraph_at = overridden(payload.polygraph_at, &fx.polygraph_at);
        let accepted_at = overridden(payload.accepted_at, &fx.accepted_at);
        let declined_at = overridden(payload.declined_at, &fx.declined_at);
        let canceled_at = overridden(payload.canceled_at, &fx.canceled_at);

        let candidate = sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates (
                full_name, email, phone, notes, status, meet_link, department, position,
                polygraph_at, accepted_at, declined_at, canceled_at, polygraph_address, interviews
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(payload.full_name)
        .bind(payload.email.to_lowercase())
        .bind(payload.phone.unwrap_or_default())
        .bind(payload.notes)
        .bind(status)
        .bind(Option::<String>::None)
        .bind(payload.department.unwrap_or_default())
        .bind(payload.position)
        .bind(polygraph_at)
        .bind(accepted_at)
        .bind(declined_at)
        .bind(canceled_at)
        .bind(payload.polygraph_address.unwrap_or_default())
        .bind(Json(interviews))
        .fetch_one(&self.pool)
        .await?;
        Ok(candidate)
    }

    /// Applies a candidate patch: status side effects, meet-link mirroring,
    /// and the employee sync that keeps `status == success` ⟺ "employee row
    /// exists". The candidate write commits before the sync runs; a sync
    /// failure is surfaced without rolling the candidate back.
    pub async fn update_candidate(
        &self,
        id: Uuid,
        payload: UpdateCandidatePayload,
    ) -> Result<Candidate> {
        if payload.is_empty() {
            return Err(Error::BadRequest("Empty body".to_string()));
        }

        let before = self
            .get_candidate(id)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

        // fast path: nothing but a meet link — mirror it onto the head
        // interview and skip the status machinery entirely
        if let (true, Some(link)) = (payload.is_meet_link_only(), payload.meet_link.clone()) {
            let mut interviews = before.interviews.0.clone();
            if let Some(head) = interviews.first_mut() {
                head.meet_link = Some(link.clone());
            }
            let updated = sqlx::query_as::<_, Candidate>(
                r#"UPDATE candidates SET meet_link = $1, interviews = $2, updated_at = NOW()
                   WHERE id = $3 RETURNING *"#,
            )
            .bind(link)
            .bind(Json(interviews))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
            return Ok(updated);
        }

        let now = Utc::now();
        let new_status = payload.status.unwrap_or(before.status);
        let department = payload.department.unwrap_or(before.department);
        let position = patched(&before.position, &payload.position);
        if payload.department.is_some() || payload.position.is_some() {
            if !is_valid_position(Some(department), position) {
                tracing::warn!(
                    candidate_id = %id,
                    department = ?department,
                    position = ?position,
                    "unusual department/position pairing on candidate update"
                );
            }
        }

        let interviews: Vec<Interview> = match payload.interviews {
            Some(items) => items.into_iter().map(|i| i.into_interview()).collect(),
            None => before.interviews.0.clone(),
        };

        // keep the root meet link in step with the head interview
        let meet_link = payload
            .meet_link
            .clone()
            .or_else(|| interviews.first().and_then(|head| head.meet_link.clone()))
            .or(before.meet_link.clone());

        let fx = if let Some(status) = payload.status {
            derive_status_side_effects(
                status,
                payload.accepted_at.flatten(),
                payload.declined_at.flatten(),
                payload.canceled_at.flatten(),
                now,
            )
        } else {
            StatusSideEffects::default()
        };
        let polygraph_at = overridden(patched(&before.polygraph_at, &payload.polygraph_at), &fx.polygraph_at);
        let accepted_at = overridden(patched(&before.accepted_at, &payload.accepted_at), &fx.accepted_at);
        let declined_at = overridden(patched(&before.declined_at, &payload.declined_at), &fx.declined_at);
        let canceled_at = overridden(patched(&before.canceled_at, &payload.canceled_at), &fx.canceled_at);

        let updated = sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET
                full_name = $1, email = $2, phone = $3, notes = $4, status = $5,
                meet_link = $6, department = $7, position = $8,
                polygraph_at = $9, accepted_at = $10, declined_at = $11, canceled_at = $12,
                polygraph_address = $13, interviews = $14, updated_at = NOW()
            WHERE id = $15
            RETURNING *
            "#,
        )
        .bind(payload.full_name.unwrap_or(before.full_name.clone()))
        .bind(payload.email.map(|e| e.to_lowercase()).unwrap_or(before.email.clone()))
        .bind(payload.phone.unwrap_or(before.phone.clone()))
        .bind(patched(&before.notes, &payload.notes.map(Some)))
        .bind(new_status)
        .bind(meet_link)
        .bind(department)
        .bind(position)
        .bind(polygraph_at)
        .bind(accepted_at)
        .bind(declined_at)
        .bind(canceled_at)
        .bind(patched(&Some(before.polygraph_address.clone()), &payload.polygraph_address).unwrap_or_default())
        .bind(Json(interviews))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        self.sync_employee_on_transition(before.status, &updated).await?;

        Ok(updated)
    }

    /// Narrow transition endpoint: target status plus optional explicit
    /// event instants.
    pub async fn apply_status_transition(
        &self,
        id: Uuid,
        payload: UpdateStatusPayload,
    ) -> Result<Candidate> {
        let patch = UpdateCandidatePayload {
            status: Some(payload.status),
            accepted_at: payload.accepted_at.map(Some),
            declined_at: payload.declined_at.map(Some),
            canceled_at: payload.canceled_at.map(Some),
            ..Default::default()
        };
        self.update_candidate(id, patch).await
    }

    async fn sync_employee_on_transition(
        &self,
        previous: CandidateStatus,
        candidate: &Candidate,
    ) -> Result<()> {
        let was_success = previous == CandidateStatus::Success;
        let is_success = candidate.status == CandidateStatus::Success;
        let email = candidate.email.to_lowercase();

        if is_success {
            let employee = self.upsert_employee_for_success(candidate, &email).await?;
            tracing::info!(
                candidate_id = %candidate.id,
                employee_id = %employee.id,
                "employee record synced for hired candidate"
            );
        } else if was_success && !is_success {
            self.delete_employee_for_candidate(candidate.id, &email).await?;
            tracing::info!(candidate_id = %candidate.id, "employee record removed after status left success");
        }
        Ok(())
    }

    /// Upsert keyed by the candidate back-reference OR a matching email,
    /// whichever matches first. `hired_at` defaults to the acceptance
    /// instant pinned to 12:00 UTC when the row does not already carry one.
    async fn upsert_employee_for_success(
        &self,
        candidate: &Candidate,
        email: &str,
    ) -> Result<Employee> {
        let hired_at = utc_noon_of(candidate.accepted_at.unwrap_or_else(Utc::now));
        let notes = candidate.notes.clone().unwrap_or_default();

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM employees
            WHERE candidate_id = $1 OR email = $2
            ORDER BY (candidate_id = $1) DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(candidate.id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let employee = match existing {
            Some(employee_id) => {
                sqlx::query_as::<_, Employee>(
                    r#"
                    UPDATE employees SET
                        candidate_id = $1, full_name = $2, email = $3, phone = $4,
                        department = $5, position = $6, notes = $7,
                        hired_at = COALESCE(hired_at, $8), updated_at = NOW()
                    WHERE id = $9
                    RETURNING *
                    "#,
                )
                .bind(candidate.id)
                .bind(&candidate.full_name)
                .bind(email)
                .bind(&candidate.phone)
                .bind(candidate.department)
                .bind(candidate.position)
                .bind(notes)
                .bind(hired_at)
                .bind(employee_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Employee>(
                    r#"
                    INSERT INTO employees (
                        candidate_id, full_name, email, phone, department, position, notes, hired_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING *
                    "#,
                )
                .bind(candidate.id)
                .bind(&candidate.full_name)
                .bind(email)
                .bind(&candidate.phone)
                .bind(candidate.department)
                .bind(candidate.position)
                .bind(notes)
                .bind(hired_at)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(employee)
    }

    async fn delete_employee_for_candidate(
        &self,
        candidate_id: Uuid,
        fallback_email: &str,
    ) -> Result<()> {
        let by_candidate = sqlx::query(r#"DELETE FROM employees WHERE candidate_id = $1"#)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        if by_candidate.rows_affected() == 0 && !fallback_email.is_empty() {
            sqlx::query(r#"DELETE FROM employees WHERE email = $1"#)
                .bind(fallback_email)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_candidate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM candidates WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Candidate not found".to_string()));
        }
        Ok(())
    }

    /// Drops the current (head) meet: clears the root link and shifts the
    /// interview sequence left by one.
    pub async fn remove_head_meet(&self, id: Uuid) -> Result<Candidate> {
        let candidate = self
            .get_candidate(id)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
        let tail: Vec<Interview> = candidate.interviews.0.iter().skip(1).cloned().collect();
        let updated = sqlx::query_as::<_, Candidate>(
            r#"UPDATE candidates SET meet_link = NULL, interviews = $1, updated_at = NOW()
               WHERE id = $2 RETURNING *"#,
        )
        .bind(Json(tail))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn metrics(
        &self,
        tz_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<CandidateMetricsResponse> {
        let mut current: BTreeMap<String, i64> = CandidateStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let counts = sqlx::query_as::<_, (CandidateStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM candidates GROUP BY status"#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (status, count) in counts {
            current.insert(status.as_str().to_string(), count);
        }

        let monthly_rows = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT e.event, to_char(date_trunc('month', e.at AT TIME ZONE $1), 'YYYY-MM') AS month, COUNT(*)
            FROM (
                SELECT 'polygraph' AS event, polygraph_at AS at FROM candidates
                UNION ALL SELECT 'accepted', accepted_at FROM candidates
                UNION ALL SELECT 'declined', declined_at FROM candidates
                UNION ALL SELECT 'canceled', canceled_at FROM candidates
            ) e
            WHERE e.at IS NOT NULL AND e.at >= $2 AND e.at <= $3
            GROUP BY e.event, month
            ORDER BY month
            "#,
        )
        .bind(tz_name)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut monthly_map: BTreeMap<String, MonthlyEvents> = BTreeMap::new();
        for (event, month, count) in monthly_rows {
            let entry = monthly_map.entry(month.clone()).or_insert_with(|| MonthlyEvents {
                month,
                polygraph: 0,
                accepted: 0,
                declined: 0,
                canceled: 0,
            });
            match event.as_str() {
                "polygraph" => entry.polygraph = count,
                "accepted" => entry.accepted = count,
                "declined" => entry.declined = count,
                "canceled" => entry.canceled = count,
                _ => {}
            }
        }

        let first_touch_rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT to_char(date_trunc('month', created_at AT TIME ZONE $1), 'YYYY-MM') AS month, COUNT(*)
            FROM candidates
            WHERE created_at >= $2 AND created_at <= $3
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(tz_name)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(CandidateMetricsResponse {
            current,
            monthly: monthly_map.into_values().collect(),
            first_touches: first_touch_rows
                .into_iter()
                .map(|(month, created)| FirstTouches { month, created })
                .collect(),
        })
    }

    pub async fn list_snapshots(
        &self,
        from_month: NaiveDate,
        to_month: NaiveDate,
    ) -> Result<Vec<SnapshotItem>> {
        let rows = sqlx::query_as::<_, (String, Json<BTreeMap<String, i64>>)>(
            r#"
            SELECT to_char(month, 'YYYY-MM'), counts
            FROM candidate_snapshots
            WHERE month >= $1 AND month <= $2
            ORDER BY month
            "#,
        )
        .bind(from_month)
        .bind(to_month)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(month, counts)| SnapshotItem { month, counts: counts.0 })
            .collect())
    }

    /// Freezes the status distribution for a month (default: previous month).
    pub async fn freeze_snapshot(&self, month: NaiveDate) -> Result<SnapshotItem> {
        let mut counts: BTreeMap<String, i64> = CandidateStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let rows = sqlx::query_as::<_, (CandidateStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM candidates GROUP BY status"#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (status, count) in rows {
            counts.insert(status.as_str().to_string(), count);
        }

        let (month_key, counts) = sqlx::query_as::<_, (String, Json<BTreeMap<String, i64>>)>(
            r#"
            INSERT INTO candidate_snapshots (month, counts)
            VALUES ($1, $2)
            ON CONFLICT (month) DO UPDATE SET counts = EXCLUDED.counts, updated_at = NOW()
            RETURNING to_char(month, 'YYYY-MM'), counts
            "#,
        )
        .bind(month)
        .bind(Json(counts))
        .fetch_one(&self.pool)
        .await?;
        Ok(SnapshotItem { month: month_key, counts: counts.0 })
    }
}

impl CandidateService {
    /// Jira interview event: upsert the candidate by email, then update the
    /// interview matched by issue id or append a new one.
    pub async fn ingest_jira_interview(
        &self,
        payload: &crate::dto::webhook_dto::JiraInterviewPayload,
    ) -> Result<Candidate> {
        let email = payload.candidate.email.to_lowercase();
        let existing =
            sqlx::query_as::<_, Candidate>(r#"SELECT * FROM candidates WHERE email = $1"#)
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        let candidate = match existing {
            Some(candidate) => candidate,
            None => {
                let full_name = payload
                    .candidate
                    .full_name
                    .clone()
                    .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());
                sqlx::query_as::<_, Candidate>(
                    r#"INSERT INTO candidates (full_name, email) VALUES ($1, $2) RETURNING *"#,
                )
                .bind(full_name)
                .bind(&email)
                .fetch_one(&self.pool)
                .await?
            }
        };

        let mut interviews = candidate.interviews.0.clone();
        match interviews
            .iter_mut()
            .find(|i| i.jira_issue_id.as_deref() == Some(payload.issue_id.as_str()))
        {
            Some(interview) => {
                interview.scheduled_at = payload.scheduled_at;
                interview.participants = payload.participants.clone();
                interview.meet_link = payload.meet_link.clone();
                interview.google_calendar_event_id = payload.google_calendar_event_id.clone();
                interview.notes = payload.summary.clone();
                // a reschedule re-arms the reminder; the dedup key still
                // guards each distinct instant
                interview.reminded = false;
            }
            None => interviews.push(payload.build_interview()),
        }

        let updated = sqlx::query_as::<_, Candidate>(
            r#"UPDATE candidates SET interviews = $1, updated_at = NOW() WHERE id = $2 RETURNING *"#,
        )
        .bind(Json(interviews))
        .bind(candidate.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }
}

/// "YYYY-MM" → first day of that month.
pub fn parse_year_month(raw: &str) -> Option<NaiveDate> {
    let (y, m) = raw.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// First day of the month before the one containing `today`.
pub fn previous_month(today: NaiveDate) -> NaiveDate {
    let first_of_current = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let last_of_previous = first_of_current.pred_opt().unwrap_or(first_of_current);
    NaiveDate::from_ymd_opt(last_of_previous.year(), last_of_previous.month(), 1)
        .unwrap_or(last_of_previous)
}
