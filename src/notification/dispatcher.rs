//! Notification fan-out for application events.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ChannelKind, Channels, NewNotification, Notification, NotificationType, best_effort};
use crate::clock::Clock;
use crate::error::Result;
use crate::store::{NotificationRepository, Store, UserRepository};
use crate::telemetry;
use crate::user::{REVIEWER_ROLES, User};

/// Applicant who just submitted onboarding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Applicant {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
}

/// Port used by the review flow to announce events.
#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    /// Alert reviewers about a submitted application.
    /// Returns the number of in-app notifications written.
    async fn onboarding_submitted(&self, applicant: &Applicant) -> Result<usize>;

    /// Tell the applicant their application was approved.
    async fn application_approved(&self, applicant: &User) -> Result<Notification>;

    /// Tell the applicant their application was rejected.
    async fn application_rejected(&self, applicant: &User) -> Result<Notification>;
}

/// Writes in-app notifications then best-effort sends on outbound channels.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    channels: Channels,
}

impl NotificationDispatcher {
    /// Create a new [`NotificationDispatcher`].
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, channels: Channels) -> Self {
        Self {
            store,
            clock,
            channels,
        }
    }

    /// Insert exactly one notification. No outbound send.
    pub async fn create_notification(&self, new: NewNotification) -> Result<Notification> {
        let notification = new.into_notification(self.clock.now());
        self.store.insert_notification(&notification).await?;

        tracing::debug!(
            id = notification.id,
            recipient = notification.recipient_id,
            kind = %notification.r#type,
            "notification created"
        );
        telemetry::notification_created(notification.r#type.as_str());

        Ok(notification)
    }

    /// Every reviewer, resolved on each call and deduplicated by ID.
    async fn reviewers(&self) -> Result<Vec<User>> {
        let reviewers: BTreeMap<String, User> = self
            .store
            .find_users_by_roles(&REVIEWER_ROLES)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        Ok(reviewers.into_values().collect())
    }

    /// Alert reviewers in-app, then the membership secretary on WhatsApp and
    /// Telegram.
    pub async fn notify_onboarding_submission(&self, applicant: &Applicant) -> Result<usize> {
        let title = "New membership application".to_owned();
        let content = format!(
            "{} has completed onboarding and submitted a membership application for review.",
            applicant.name
        );
        let metadata = json!({
            "applicantId": applicant.id,
            "applicantName": applicant.name,
            "email": applicant.email,
            "phone": applicant.phone,
            "whatsapp": applicant.whatsapp,
        });

        let reviewers = self.reviewers().await?;
        for reviewer in &reviewers {
            self.create_notification(NewNotification {
                r#type: NotificationType::OnboardingSubmitted,
                title: title.clone(),
                content: content.clone(),
                recipient_id: reviewer.id.clone(),
                metadata: metadata.clone(),
            })
            .await?;
        }

        tracing::info!(
            applicant = applicant.id,
            recipients = reviewers.len(),
            "reviewers notified of submission"
        );

        let message = secretary_message(applicant);

        if let (Some(whatsapp), Some(to)) = (&self.channels.whatsapp, &self.channels.secretary_whatsapp) {
            best_effort(ChannelKind::WhatsApp, whatsapp.send(to, &message)).await;
        }

        if let Some(telegram) = &self.channels.telegram {
            if let Some(chat_id) = &self.channels.secretary_chat_id {
                best_effort(ChannelKind::TelegramChat, telegram.send_message(chat_id, &message)).await;
            }
            if let Some(channel) = &self.channels.notifications_channel {
                best_effort(ChannelKind::TelegramChannel, telegram.send_channel(channel, &message)).await;
            }
        }

        Ok(reviewers.len())
    }

    /// Tell the applicant about a decision in-app, then on WhatsApp (stored
    /// phone) and Telegram (applicant chat).
    async fn notify_decision(
        &self,
        applicant: &User,
        r#type: NotificationType,
        title: &str,
        content: &str,
    ) -> Result<Notification> {
        let notification = self
            .create_notification(NewNotification {
                r#type,
                title: title.to_owned(),
                content: content.to_owned(),
                recipient_id: applicant.id.clone(),
                metadata: json!({ "applicantId": applicant.id }),
            })
            .await?;

        let message = format!("{title}\n\n{content}");

        if let (Some(whatsapp), Some(phone)) = (&self.channels.whatsapp, &applicant.phone) {
            best_effort(ChannelKind::WhatsApp, whatsapp.send(phone, &message)).await;
        }

        if let (Some(telegram), Some(chat_id)) =
            (&self.channels.telegram, self.channels.applicant_chat(&applicant.id))
        {
            best_effort(ChannelKind::TelegramChat, telegram.send_message(&chat_id, &message)).await;
        }

        Ok(notification)
    }

    /// Approval announcement.
    pub async fn notify_application_approved(&self, applicant: &User) -> Result<Notification> {
        self.notify_decision(
            applicant,
            NotificationType::ApplicationApproved,
            "Application approved",
            "Congratulations! Your membership application has been approved. Welcome to the association.",
        )
        .await
    }

    /// Rejection announcement.
    pub async fn notify_application_rejected(&self, applicant: &User) -> Result<Notification> {
        self.notify_decision(
            applicant,
            NotificationType::ApplicationRejected,
            "Application update",
            "Your membership application has been reviewed and was not approved. Please contact the membership office for details.",
        )
        .await
    }
}

fn secretary_message(applicant: &Applicant) -> String {
    let mut message = format!(
        "New membership application\n\nName: {}\nID: {}",
        applicant.name, applicant.id
    );
    for (label, value) in [
        ("Email", &applicant.email),
        ("Phone", &applicant.phone),
        ("WhatsApp", &applicant.whatsapp),
    ] {
        if let Some(value) = value {
            message.push_str(&format!("\n{label}: {value}"));
        }
    }
    message
}

#[async_trait]
impl ReviewNotifier for NotificationDispatcher {
    async fn onboarding_submitted(&self, applicant: &Applicant) -> Result<usize> {
        self.notify_onboarding_submission(applicant).await
    }

    async fn application_approved(&self, applicant: &User) -> Result<Notification> {
        self.notify_application_approved(applicant).await
    }

    async fn application_rejected(&self, applicant: &User) -> Result<Notification> {
        self.notify_application_rejected(applicant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use crate::test_support::{RecordingTelegram, RecordingWhatsApp, user};
    use crate::user::Role;

    fn applicant() -> Applicant {
        Applicant {
            id: "doc".into(),
            name: "Dr. Salma".into(),
            email: Some("salma@example.org".into()),
            phone: Some("+966500000000".into()),
            whatsapp: None,
        }
    }

    fn dispatcher(store: &MemoryStore, channels: Channels) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(1_700_000_000)),
            channels,
        )
    }

    #[tokio::test]
    async fn test_submission_one_row_per_reviewer() {
        let store = MemoryStore::new();
        store.insert_user(user("admin", Role::Admin)).await;
        store.insert_user(user("secretary", Role::Membership)).await;
        store.insert_user(user("content", Role::Content)).await;
        store.insert_user(user("doc", Role::User)).await;

        let count = dispatcher(&store, Channels::default())
            .notify_onboarding_submission(&applicant())
            .await
            .unwrap();
        assert_eq!(count, 2);

        let rows = store.notifications().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, rows[1].title);
        assert_eq!(rows[0].content, rows[1].content);
        assert_ne!(rows[0].recipient_id, rows[1].recipient_id);
        assert!(rows.iter().all(|n| n.r#type == NotificationType::OnboardingSubmitted));
        assert!(rows.iter().all(|n| !n.is_read));
        assert_eq!(rows[0].metadata["applicantId"], "doc");
    }

    #[tokio::test]
    async fn test_submission_without_reviewers() {
        let store = MemoryStore::new();
        store.insert_user(user("doc", Role::User)).await;

        let count = dispatcher(&store, Channels::default())
            .notify_onboarding_submission(&applicant())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_submission_channels() {
        let store = MemoryStore::new();
        store.insert_user(user("admin", Role::Admin)).await;
        let whatsapp = RecordingWhatsApp::default();
        let telegram = RecordingTelegram::default();

        let channels = Channels {
            whatsapp: Some(Arc::new(whatsapp.clone())),
            secretary_whatsapp: Some("+966511111111".into()),
            telegram: Some(Arc::new(telegram.clone())),
            secretary_chat_id: Some("42".into()),
            notifications_channel: Some("@membership".into()),
            applicant_chat_id: None,
        };
        dispatcher(&store, channels)
            .notify_onboarding_submission(&applicant())
            .await
            .unwrap();

        let sent = whatsapp.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+966511111111");
        assert!(sent[0].1.contains("Dr. Salma"));
        assert_eq!(telegram.chats(), vec!["42".to_owned()]);
        assert_eq!(telegram.channels(), vec!["@membership".to_owned()]);
    }

    #[tokio::test]
    async fn test_whatsapp_failure_does_not_skip_telegram() {
        let store = MemoryStore::new();
        let applicant = user("doc", Role::User);
        store.insert_user(applicant.clone()).await;
        let telegram = RecordingTelegram::default();

        let channels = Channels {
            whatsapp: Some(Arc::new(RecordingWhatsApp::failing())),
            telegram: Some(Arc::new(telegram.clone())),
            applicant_chat_id: Some("chat-{id}".into()),
            ..Default::default()
        };
        let notification = dispatcher(&store, channels)
            .notify_application_approved(&applicant)
            .await
            .unwrap();

        assert_eq!(notification.r#type, NotificationType::ApplicationApproved);
        assert_eq!(notification.recipient_id, "doc");
        assert_eq!(telegram.chats(), vec!["chat-doc".to_owned()]);
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_without_phone_skips_whatsapp() {
        let store = MemoryStore::new();
        let mut applicant = user("doc", Role::User);
        applicant.phone = None;
        store.insert_user(applicant.clone()).await;
        let whatsapp = RecordingWhatsApp::default();

        let channels = Channels {
            whatsapp: Some(Arc::new(whatsapp.clone())),
            ..Default::default()
        };
        let notification = dispatcher(&store, channels)
            .notify_application_rejected(&applicant)
            .await
            .unwrap();

        assert_eq!(notification.r#type, NotificationType::ApplicationRejected);
        assert!(whatsapp.sent().is_empty());
    }
}
