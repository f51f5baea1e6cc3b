//! Shared test doubles and fixtures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, ServerError};
use crate::notification::{
    Applicant, Notification, ReviewNotifier, TelegramSender, WhatsAppSender,
};
use crate::user::{Role, User};

/// User fixture with every contact field filled.
pub fn user(id: &str, role: Role) -> User {
    User {
        id: id.into(),
        name: Some(format!("User {id}")),
        email: Some(format!("{id}@example.org")),
        phone: Some("+966500000001".into()),
        role,
        onboarded: false,
    }
}

/// WhatsApp sender recording every message.
#[derive(Clone, Default)]
pub struct RecordingWhatsApp {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingWhatsApp {
    /// Sender failing every call.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WhatsAppSender for RecordingWhatsApp {
    async fn send(&self, to: &str, message: &str) -> Result<()> {
        if self.fail {
            return Err(ServerError::Transport("whatsapp unreachable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_owned(), message.to_owned()));
        }
        Ok(())
    }
}

/// Telegram sender recording destinations.
#[derive(Clone, Default)]
pub struct RecordingTelegram {
    chats: Arc<Mutex<Vec<String>>>,
    channels: Arc<Mutex<Vec<String>>>,
}

impl RecordingTelegram {
    pub fn chats(&self) -> Vec<String> {
        self.chats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TelegramSender for RecordingTelegram {
    async fn send_message(&self, chat_id: &str, _message: &str) -> Result<()> {
        if let Ok(mut chats) = self.chats.lock() {
            chats.push(chat_id.to_owned());
        }
        Ok(())
    }

    async fn send_channel(&self, channel_id: &str, _message: &str) -> Result<()> {
        if let Ok(mut channels) = self.channels.lock() {
            channels.push(channel_id.to_owned());
        }
        Ok(())
    }
}

/// Notifier failing every announcement.
pub struct FailingNotifier;

#[async_trait]
impl ReviewNotifier for FailingNotifier {
    async fn onboarding_submitted(&self, _applicant: &Applicant) -> Result<usize> {
        Err(ServerError::Transport("notifier down".into()))
    }

    async fn application_approved(&self, _applicant: &User) -> Result<Notification> {
        Err(ServerError::Transport("notifier down".into()))
    }

    async fn application_rejected(&self, _applicant: &User) -> Result<Notification> {
        Err(ServerError::Transport("notifier down".into()))
    }
}
