use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::candidate::Candidate;
use crate::models::employee::Employee;
use crate::models::notification::{DedupKey, DEDUP_SCOPE};
use crate::models::subscriber::Subscriber;

/// Storage surface the reminder engine runs against. The dedup claim is the
/// only cross-process mutual-exclusion mechanism the engine relies on.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Candidates still in play whose head interview is scheduled inside
    /// [from, to] and has not been marked reminded.
    async fn find_candidates_with_imminent_head_interview(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candidate>>;

    /// Active employees with a known birthday.
    async fn find_employees_with_birthday(&self) -> Result<Vec<Employee>>;

    async fn find_enabled_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Attempts to create the dedup record; `true` means this caller won the
    /// claim and owns the one allowed notification round for the key.
    async fn claim_dedup_record(&self, key: &DedupKey, expires_at: DateTime<Utc>) -> Result<bool>;

    async fn purge_expired_dedup(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Last local-day key a daily job fired for, persisted so gating
    /// survives process restarts.
    async fn last_run_day(&self, job_name: &str) -> Result<Option<String>>;

    async fn set_last_run_day(&self, job_name: &str, day_key: &str) -> Result<()>;

    async fn mark_head_interview_reminded(&self, candidate_id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn find_candidates_with_imminent_head_interview(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let candidates = sqlx::query_as::<_, Candidate>(
            r#"
            SELECT * FROM candidates
            WHERE status IN ('not_held', 'reserve')
              AND jsonb_array_length(interviews) > 0
              AND (interviews -> 0 ->> 'scheduled_at')::timestamptz BETWEEN $1 AND $2
              AND COALESCE((interviews -> 0 ->> 'reminded')::boolean, FALSE) = FALSE
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(candidates)
    }

    async fn find_employees_with_birthday(&self) -> Result<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"SELECT * FROM employees WHERE birthday_at IS NOT NULL AND terminated_at IS NULL"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn find_enabled_subscribers(&self) -> Result<Vec<Subscriber>> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"SELECT * FROM subscribers WHERE enabled = TRUE ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscribers)
    }

    async fn claim_dedup_record(&self, key: &DedupKey, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminder_dedup (scope, candidate_id, scheduled_at, kind, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (scope, candidate_id, scheduled_at, kind) DO NOTHING
            "#,
        )
        .bind(DEDUP_SCOPE)
        .bind(key.candidate_id)
        .bind(key.scheduled_at)
        .bind(key.kind.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired_dedup(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM reminder_dedup WHERE expires_at <= $1"#)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn last_run_day(&self, job_name: &str) -> Result<Option<String>> {
        let day_key: Option<String> =
            sqlx::query_scalar(r#"SELECT last_day_key FROM job_runs WHERE job_name = $1"#)
                .bind(job_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(day_key)
    }

    async fn set_last_run_day(&self, job_name: &str, day_key: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (job_name, last_day_key)
            VALUES ($1, $2)
            ON CONFLICT (job_name) DO UPDATE SET last_day_key = EXCLUDED.last_day_key, updated_at = NOW()
            "#,
        )
        .bind(job_name)
        .bind(day_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_head_interview_reminded(&self, candidate_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE candidates
            SET interviews = jsonb_set(interviews, '{0,reminded}', 'true'::jsonb), updated_at = NOW()
            WHERE id = $1 AND jsonb_array_length(interviews) > 0
            "#,
        )
        .bind(candidate_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
