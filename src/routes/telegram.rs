use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::services::telegram_service::Notifier;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Bot webhook, gated by the path token. `/start` opts the chat in as an
/// enabled subscriber. Always answers 200 once the token checks out so
/// Telegram does not keep retrying the update.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(update): Json<TelegramUpdate>,
) -> Result<impl IntoResponse> {
    let config = crate::config::get_config();
    if token != config.telegram_bot_token {
        return Err(Error::Unauthorized("bad token".to_string()));
    }
    tracing::info!(update_id = update.update_id, "telegram webhook update");

    if let Some(message) = update.message {
        let text = message.text.unwrap_or_default();
        if text.trim().to_lowercase().starts_with("/start") {
            let chat = message.chat;
            let subscribed = state
                .subscriber_service
                .upsert_on_start(
                    chat.id,
                    chat.username.as_deref().unwrap_or(""),
                    chat.first_name.as_deref().unwrap_or(""),
                    chat.last_name.as_deref().unwrap_or(""),
                )
                .await;
            match subscribed {
                Ok(_) => {
                    if let Err(err) = state
                        .notifier
                        .deliver(
                            chat.id,
                            "✅ Подписка оформлена. Будете получать уведомления о ДР и митах.",
                        )
                        .await
                    {
                        tracing::warn!(chat_id = chat.id, error = ?err, "failed to ack subscription");
                    }
                }
                Err(err) => {
                    tracing::warn!(chat_id = chat.id, error = ?err, "failed to store subscriber");
                }
            }
        }
    }

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct BroadcastTestPayload {
    pub text: Option<String>,
}

/// Manual broadcast for checking the delivery path end to end.
pub async fn broadcast_test(
    State(state): State<AppState>,
    Json(payload): Json<BroadcastTestPayload>,
) -> Result<impl IntoResponse> {
    let text = payload
        .text
        .unwrap_or_else(|| "✅ CRM: тест уведомлений".to_string());
    let subscribers = state.subscriber_service.find_enabled().await?;
    let mut sent = 0;
    for subscriber in &subscribers {
        match state.notifier.deliver(subscriber.chat_id, &text).await {
            Ok(()) => sent += 1,
            Err(err) => {
                tracing::warn!(chat_id = subscriber.chat_id, error = ?err, "test broadcast failed")
            }
        }
    }
    Ok(Json(json!({ "ok": true, "sent": sent })))
}

pub async fn list_subscribers(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let subscribers = state.subscriber_service.list_subscribers().await?;
    Ok(Json(subscribers))
}

#[derive(Debug, Deserialize)]
pub struct SubscriberTogglePayload {
    pub enabled: bool,
}

pub async fn set_subscriber_enabled(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(payload): Json<SubscriberTogglePayload>,
) -> Result<impl IntoResponse> {
    let subscriber = state
        .subscriber_service
        .set_enabled(chat_id, payload.enabled)
        .await?;
    Ok(Json(subscriber))
}
