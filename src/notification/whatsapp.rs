//! WhatsApp Cloud API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::WhatsAppSender;
use crate::error::{Result, ServerError};

#[derive(Debug, Serialize)]
struct Text<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    messaging_product: &'static str,
    to: String,
    r#type: &'static str,
    text: Text<'a>,
}

/// Sends text messages to phone numbers.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: Client,
    api_url: String,
    token: String,
}

impl WhatsAppClient {
    /// Create a new [`WhatsAppClient`].
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_owned(),
            token: token.to_owned(),
        })
    }
}

/// Strip everything but digits, as expected by the API.
pub fn normalize_number(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

#[async_trait]
impl WhatsAppSender for WhatsAppClient {
    async fn send(&self, to: &str, message: &str) -> Result<()> {
        let to = normalize_number(to);
        if to.is_empty() {
            return Err(ServerError::Transport("empty WhatsApp number".into()));
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&Message {
                messaging_product: "whatsapp",
                to,
                r#type: "text",
                text: Text { body: message },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServerError::Transport(format!(
                "whatsapp returned {status}: {body}"
            )));
        }

        tracing::trace!("whatsapp message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("+966 (55) 123-4567"), "966551234567");
        assert_eq!(normalize_number("n/a"), "");
    }
}
