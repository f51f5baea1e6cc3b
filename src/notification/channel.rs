//! Outbound chat channels.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::telemetry;

/// Port for WhatsApp messages.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    /// Send a text message to a phone number.
    async fn send(&self, to: &str, message: &str) -> Result<()>;
}

/// Port for Telegram messages.
#[async_trait]
pub trait TelegramSender: Send + Sync {
    /// Send a text message to a chat.
    async fn send_message(&self, chat_id: &str, message: &str) -> Result<()>;

    /// Post a text message on a channel.
    async fn send_channel(&self, channel_id: &str, message: &str) -> Result<()>;
}

/// Outbound channel targeted by a send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    WhatsApp,
    TelegramChat,
    TelegramChannel,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::WhatsApp => "whatsapp",
            ChannelKind::TelegramChat => "telegram_chat",
            ChannelKind::TelegramChannel => "telegram_channel",
        })
    }
}

/// Enabled outbound channels and their destinations.
///
/// A `None` sender means the channel is disabled.
#[derive(Clone, Default)]
pub struct Channels {
    pub whatsapp: Option<Arc<dyn WhatsAppSender>>,
    /// Membership secretary number for submission alerts.
    pub secretary_whatsapp: Option<String>,
    pub telegram: Option<Arc<dyn TelegramSender>>,
    /// Membership secretary chat for submission alerts.
    pub secretary_chat_id: Option<String>,
    /// Channel receiving submission alerts.
    pub notifications_channel: Option<String>,
    /// Applicant chat, `{id}` is replaced by the applicant ID.
    pub applicant_chat_id: Option<String>,
}

impl Channels {
    /// Resolve the applicant chat for `applicant_id`.
    pub fn applicant_chat(&self, applicant_id: &str) -> Option<String> {
        self.applicant_chat_id
            .as_ref()
            .filter(|template| !template.is_empty())
            .map(|template| template.replace("{id}", applicant_id))
    }
}

/// Await one outbound send, log and count its outcome.
///
/// Never fails: a channel error must not affect other channels nor the
/// primary action.
pub async fn best_effort<F>(kind: ChannelKind, send: F) -> bool
where
    F: Future<Output = Result<()>>,
{
    match send.await {
        Ok(()) => {
            tracing::debug!(channel = %kind, "outbound notification sent");
            telemetry::outbound_sent(kind.to_string(), true);
            true
        },
        Err(err) => {
            tracing::warn!(channel = %kind, error = %err, "outbound notification failed");
            telemetry::outbound_sent(kind.to_string(), false);
            false
        },
    }
}
