use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};

/// Outbound message transport: deliver text to one subscriber identifier.
/// Failures are per-recipient and independent; the caller decides whether to
/// continue the fan-out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", bot_token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .form(&[
                ("chat_id", chat_id.to_string()),
                ("text", text.to_string()),
                ("parse_mode", "HTML".to_string()),
                ("disable_web_page_preview", "true".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!("Telegram {}: {}", status, body)));
        }
        Ok(())
    }
}
