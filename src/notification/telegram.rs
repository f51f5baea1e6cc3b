//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TelegramSender;
use crate::error::{Result, ServerError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Bot posting messages through `sendMessage`.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    endpoint: String,
}

impl TelegramClient {
    /// Create a new [`TelegramClient`].
    pub fn new(api_url: &str, bot_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{bot_token}/sendMessage", api_url.trim_end_matches('/')),
        })
    }

    async fn post(&self, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = response.json().await?;
        if !status.is_success() || !body.ok {
            return Err(ServerError::Transport(format!(
                "telegram returned {status}: {}",
                body.description.unwrap_or_default()
            )));
        }

        tracing::trace!(chat_id, "telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl TelegramSender for TelegramClient {
    async fn send_message(&self, chat_id: &str, message: &str) -> Result<()> {
        self.post(chat_id, message).await
    }

    async fn send_channel(&self, channel_id: &str, message: &str) -> Result<()> {
        let channel_id = if channel_id.starts_with('@') || channel_id.starts_with('-') {
            channel_id.to_owned()
        } else {
            format!("@{channel_id}")
        };
        self.post(&channel_id, message).await
    }
}
