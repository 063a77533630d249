// Telegram Bot API sink — POST /bot{token}/sendMessage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::traits::PushSink;
use crate::error::WatchError;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(api_url: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("wazewatch/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

#[async_trait]
impl PushSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        debug!(chat_id = %self.chat_id, "Sending Telegram message");

        let response = self
            .client
            .post(self.endpoint())
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(|e| WatchError::TransientFetch(format!("telegram: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(
                WatchError::TransientFetch(format!("telegram returned {status}: {body}")).into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let sink = TelegramSink::new("https://api.telegram.org/", "123:abc", "-100").unwrap();
        assert_eq!(
            sink.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(SendMessage {
            chat_id: "-100",
            text: "hi",
            disable_web_page_preview: true,
        })
        .unwrap();
        assert_eq!(json["chat_id"], "-100");
        assert_eq!(json["text"], "hi");
    }
}
