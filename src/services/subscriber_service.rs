use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::subscriber::Subscriber;

#[derive(Clone)]
pub struct SubscriberService {
    pool: PgPool,
}

impl SubscriberService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// First `/start` creates the subscriber enabled; a repeated `/start`
    /// re-enables and refreshes the profile fields.
    pub async fn upsert_on_start(
        &self,
        chat_id: i64,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Subscriber> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO subscribers (chat_id, username, first_name, last_name, enabled)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (chat_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                enabled = TRUE,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(subscriber)
    }

    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let subscribers =
            sqlx::query_as::<_, Subscriber>(r#"SELECT * FROM subscribers ORDER BY created_at DESC"#)
                .fetch_all(&self.pool)
                .await?;
        Ok(subscribers)
    }

    pub async fn find_enabled(&self) -> Result<Vec<Subscriber>> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"SELECT * FROM subscribers WHERE enabled = TRUE ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscribers)
    }

    /// Subscribers are never hard-deleted; opting out just flips the flag.
    pub async fn set_enabled(&self, chat_id: i64, enabled: bool) -> Result<Subscriber> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            r#"UPDATE subscribers SET enabled = $1, updated_at = NOW()
               WHERE chat_id = $2 RETURNING *"#,
        )
        .bind(enabled)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Subscriber not found".to_string()))?;
        Ok(subscriber)
    }
}
