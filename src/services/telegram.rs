use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum TelegramError {
    #[error("telegram delivery is disabled")]
    Disabled,
    #[error("telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("telegram sendMessage returned ok=false: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct TgOkResponse {
    ok: bool,
    description: Option<String>,
}

/// Bot API client used to push result messages to guardians.
#[derive(Clone)]
pub(crate) struct TelegramClient {
    client: Client,
    api_base_url: String,
    token: String,
    enabled: bool,
}

impl TelegramClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, TelegramError> {
        let telegram = settings.telegram();
        let timeout = Duration::from_secs(telegram.request_timeout_seconds);
        let client = Client::builder().connect_timeout(timeout).timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base_url: telegram.api_base_url.trim_end_matches('/').to_string(),
            token: telegram.token.clone(),
            enabled: telegram.enabled && !telegram.token.is_empty(),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) async fn send_message(&self, chat_id: &str, html: &str) -> Result<(), TelegramError> {
        if !self.enabled {
            return Err(TelegramError::Disabled);
        }

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base_url, self.token))
            .json(&json!({
                "chat_id": chat_id,
                "text": html,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let payload: TgOkResponse = response.json().await?;
        if payload.ok {
            return Ok(());
        }

        Err(TelegramError::Rejected(
            payload.description.unwrap_or_else(|| "unknown Telegram API error".to_string()),
        ))
    }
}
