//! In-app notifications and their outbound fan-out.

mod channel;
mod dispatcher;
mod inbox;
pub mod telegram;
pub mod whatsapp;

pub use channel::*;
pub use dispatcher::*;
pub use inbox::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

const ID_LENGTH: usize = 16;

/// Kind of event a notification reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OnboardingSubmitted,
    ApplicationApproved,
    ApplicationRejected,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OnboardingSubmitted => "ONBOARDING_SUBMITTED",
            NotificationType::ApplicationApproved => "APPLICATION_APPROVED",
            NotificationType::ApplicationRejected => "APPLICATION_REJECTED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = crate::profile::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONBOARDING_SUBMITTED" => Ok(NotificationType::OnboardingSubmitted),
            "APPLICATION_APPROVED" => Ok(NotificationType::ApplicationApproved),
            "APPLICATION_REJECTED" => Ok(NotificationType::ApplicationRejected),
            _ => Err(crate::profile::UnknownStatus(s.to_owned())),
        }
    }
}

/// Notification as saved on database. Append-only except `is_read`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub r#type: NotificationType,
    pub title: String,
    pub content: String,
    pub recipient_id: String,
    pub is_read: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Payload to create a [`Notification`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewNotification {
    pub r#type: NotificationType,
    pub title: String,
    pub content: String,
    pub recipient_id: String,
    pub metadata: serde_json::Value,
}

impl NewNotification {
    /// Turn the payload into an unread row.
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Alphanumeric.sample_string(&mut OsRng, ID_LENGTH),
            r#type: self.r#type,
            title: self.title,
            content: self.content,
            recipient_id: self.recipient_id,
            is_read: false,
            metadata: self.metadata,
            created_at,
        }
    }
}
