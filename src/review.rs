//! Membership application state machine.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED
//!    │  ▲                 │
//! reject└──────redo───────┘
//!    ▼  │
//! REJECTED
//! ```
//!
//! Every transition is taken by a reviewer, stamps (or clears) the review and
//! persists in a single store call touching only the application columns. Applicant announcements happen after the
//! write and never fail the transition.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{Result, ServerError};
use crate::notification::ReviewNotifier;
use crate::profile::{ApplicationStatus, DoctorProfile, OnboardingStatus, ProfileDetails, Review};
use crate::revalidate::Revalidator;
use crate::store::{Decision, ProfileRepository, Store, UserRepository};
use crate::telemetry;
use crate::user::{Caller, Role, User};

const MEMBERSHIP_PATH: &str = "/membership";

/// Membership admin actions.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn ReviewNotifier>,
    clock: Arc<dyn Clock>,
    revalidator: Arc<dyn Revalidator>,
}

impl ReviewService {
    /// Create a new [`ReviewService`].
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn ReviewNotifier>,
        clock: Arc<dyn Clock>,
        revalidator: Arc<dyn Revalidator>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            revalidator,
        }
    }

    async fn find_user(&self, user_id: &str) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(ServerError::UserNotFound)
    }

    fn stamp(&self, caller: &Caller) -> Review {
        Review {
            by: caller.id.clone(),
            at: self.clock.now(),
        }
    }

    /// Approve an application and promote its owner to [`Role::Member`].
    ///
    /// A user without profile gets a placeholder one, so every approved user
    /// owns a profile.
    pub async fn approve(&self, caller: &Caller, user_id: &str) -> Result<DoctorProfile> {
        caller.require_reviewer()?;
        let mut user = self.find_user(user_id).await?;

        let decision = Decision::new(ApplicationStatus::Approved, Some(self.stamp(caller)))
            .with_placeholder(ProfileDetails::placeholder(&user))
            .with_role(Role::Member);
        let profile = self.store.commit_review(user_id, &decision).await?;
        user.role = Role::Member;

        tracing::info!(user_id, reviewer = caller.id, "application approved");
        telemetry::application_decided(profile.application_status.as_str());

        if let Err(err) = self.notifier.application_approved(&user).await {
            tracing::error!(user_id, error = %err, "approval notification failed");
        }
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(profile)
    }

    /// Reject an application. Profile must exist.
    pub async fn reject(&self, caller: &Caller, user_id: &str) -> Result<DoctorProfile> {
        caller.require_reviewer()?;
        let user = self.find_user(user_id).await?;

        let decision = Decision::new(ApplicationStatus::Rejected, Some(self.stamp(caller)));
        let profile = self.store.commit_review(user_id, &decision).await?;

        tracing::info!(user_id, reviewer = caller.id, "application rejected");
        telemetry::application_decided(profile.application_status.as_str());

        if let Err(err) = self.notifier.application_rejected(&user).await {
            tracing::error!(user_id, error = %err, "rejection notification failed");
        }
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(profile)
    }

    /// Send an application back to review. Profile must exist.
    pub async fn redo(&self, caller: &Caller, user_id: &str) -> Result<DoctorProfile> {
        caller.require_reviewer()?;
        self.find_user(user_id).await?;

        let decision = Decision::new(ApplicationStatus::Pending, None);
        let profile = self.store.commit_review(user_id, &decision).await?;

        tracing::info!(user_id, reviewer = caller.id, "application reset to pending");
        telemetry::application_decided(profile.application_status.as_str());
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(profile)
    }

    /// Force the onboarding status of a profile.
    pub async fn set_onboarding_status(
        &self,
        caller: &Caller,
        user_id: &str,
        status: &str,
    ) -> Result<DoctorProfile> {
        caller.require_reviewer()?;
        let status: OnboardingStatus = status.parse().map_err(|_| {
            ServerError::field("status", "status", "Status must be IN_PROGRESS or COMPLETED.")
        })?;

        self.find_user(user_id).await?;
        let profile = self.store.set_onboarding_status(user_id, status).await?;

        tracing::info!(user_id, %status, reviewer = caller.id, "onboarding status forced");
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(profile)
    }

    /// Change the role of a user.
    pub async fn update_user_role(&self, caller: &Caller, user_id: &str, role: &str) -> Result<Role> {
        caller.require_admin()?;
        let role: Role = role
            .parse()
            .map_err(|_| ServerError::field("role", "role", "Unknown role."))?;

        self.store.update_role(user_id, role).await?;

        tracing::info!(user_id, %role, admin = caller.id, "user role updated");
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notification::{Channels, NotificationDispatcher, NotificationType};
    use crate::revalidate::LogRevalidator;
    use crate::store::MemoryStore;
    use crate::test_support::{FailingNotifier, user};

    const NOW: i64 = 1_700_000_000;

    fn service(store: &MemoryStore, now: i64) -> ReviewService {
        let store: Arc<dyn Store> = Arc::new(store.clone());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let notifier = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&clock), Channels::default());
        ReviewService::new(store, Arc::new(notifier), clock, Arc::new(LogRevalidator))
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_user(user("admin", Role::Admin)).await;
        store.insert_user(user("secretary", Role::Membership)).await;
        store.insert_user(user("u1", Role::User)).await;
        store
    }

    fn assert_review_invariant(profile: &DoctorProfile) {
        assert_eq!(profile.review.is_some(), profile.application_status.is_decided());
    }

    #[tokio::test]
    async fn test_approve_synthesizes_profile() {
        let store = seeded().await;
        let admin = Caller::new("admin", Role::Admin);

        let profile = service(&store, NOW).approve(&admin, "u1").await.unwrap();

        assert_eq!(store.profile_count().await, 1);
        assert_eq!(profile.details.full_name_english, "User u1");
        assert_eq!(profile.application_status, ApplicationStatus::Approved);
        let review = profile.review.clone().unwrap();
        assert_eq!(review.by, "admin");
        assert_eq!(review.at.timestamp(), NOW);
        assert_review_invariant(&profile);

        let stored = store.find_profile("u1").await.unwrap().unwrap();
        assert_eq!(stored, profile);
        assert_eq!(store.find_user("u1").await.unwrap().unwrap().role, Role::Member);

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].r#type, NotificationType::ApplicationApproved);
        assert_eq!(notifications[0].recipient_id, "u1");
    }

    #[tokio::test]
    async fn test_approve_nameless_user() {
        let store = seeded().await;
        let mut nameless = user("u2", Role::PaediatricDoctor);
        nameless.name = None;
        store.insert_user(nameless).await;

        let profile = service(&store, NOW)
            .approve(&Caller::new("secretary", Role::Membership), "u2")
            .await
            .unwrap();
        assert_eq!(profile.details.full_name_english, "Unknown");
    }

    #[tokio::test]
    async fn test_approve_twice_restamps() {
        let store = seeded().await;
        let admin = Caller::new("admin", Role::Admin);
        let secretary = Caller::new("secretary", Role::Membership);

        service(&store, NOW).approve(&admin, "u1").await.unwrap();
        let profile = service(&store, NOW + 60)
            .approve(&secretary, "u1")
            .await
            .unwrap();

        assert_eq!(store.profile_count().await, 1);
        assert_eq!(profile.application_status, ApplicationStatus::Approved);
        let review = profile.review.unwrap();
        assert_eq!(review.by, "secretary");
        assert_eq!(review.at.timestamp(), NOW + 60);
    }

    #[tokio::test]
    async fn test_approve_keeps_existing_details() {
        let store = seeded().await;
        let mut profile = DoctorProfile::new("u1");
        profile.details.full_name_english = "Dr. Layla Hassan".into();
        profile.onboarding_step = 5;
        store.insert_profile(profile).await;

        let profile = service(&store, NOW)
            .approve(&Caller::new("admin", Role::Admin), "u1")
            .await
            .unwrap();
        assert_eq!(profile.details.full_name_english, "Dr. Layla Hassan");
        assert_eq!(profile.onboarding_step, 5);
    }

    #[tokio::test]
    async fn test_reject_requires_profile() {
        let store = seeded().await;

        let err = service(&store, NOW)
            .reject(&Caller::new("admin", Role::Admin), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::ProfileNotFound));
        assert_eq!(store.profile_count().await, 0);
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_reject_then_redo() {
        let store = seeded().await;
        store.insert_profile(DoctorProfile::new("u1")).await;
        let admin = Caller::new("admin", Role::Admin);
        let service = service(&store, NOW);

        let rejected = service.reject(&admin, "u1").await.unwrap();
        assert_eq!(rejected.application_status, ApplicationStatus::Rejected);
        assert_review_invariant(&rejected);
        assert_eq!(store.find_user("u1").await.unwrap().unwrap().role, Role::User);
        assert_eq!(
            store.notifications().await[0].r#type,
            NotificationType::ApplicationRejected
        );

        let pending = service.redo(&admin, "u1").await.unwrap();
        assert_eq!(pending.application_status, ApplicationStatus::Pending);
        assert_eq!(pending.review, None);
        assert_review_invariant(&pending);
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_redo_after_approve() {
        let store = seeded().await;
        let admin = Caller::new("admin", Role::Admin);
        let service = service(&store, NOW);

        service.approve(&admin, "u1").await.unwrap();
        let profile = service.redo(&admin, "u1").await.unwrap();
        let again = service.redo(&admin, "u1").await.unwrap();

        assert_eq!(profile, again);
        let stored = store.find_profile("u1").await.unwrap().unwrap();
        assert_eq!(stored.application_status, ApplicationStatus::Pending);
        assert_eq!(stored.review, None);
    }

    #[tokio::test]
    async fn test_redo_without_profile() {
        let store = seeded().await;
        let err = service(&store, NOW)
            .redo(&Caller::new("admin", Role::Admin), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::ProfileNotFound));
    }

    #[tokio::test]
    async fn test_non_reviewer_is_forbidden() {
        let store = seeded().await;
        let caller = Caller::new("u1", Role::User);
        let service = service(&store, NOW);

        assert!(matches!(
            service.approve(&caller, "u1").await,
            Err(ServerError::Forbidden)
        ));
        assert!(matches!(
            service.update_user_role(&Caller::new("secretary", Role::Membership), "u1", "ADMIN").await,
            Err(ServerError::Forbidden)
        ));
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn test_approve_unknown_user() {
        let store = seeded().await;
        let err = service(&store, NOW)
            .approve(&Caller::new("admin", Role::Admin), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UserNotFound));
    }

    #[tokio::test]
    async fn test_approve_survives_notifier_failure() {
        let store = seeded().await;
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let service = ReviewService::new(
            shared,
            Arc::new(FailingNotifier),
            Arc::new(FixedClock::new(NOW)),
            Arc::new(LogRevalidator),
        );

        let profile = service
            .approve(&Caller::new("admin", Role::Admin), "u1")
            .await
            .unwrap();
        assert_eq!(profile.application_status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_update_user_role() {
        let store = seeded().await;
        let admin = Caller::new("admin", Role::Admin);
        let service = service(&store, NOW);

        assert_eq!(
            service.update_user_role(&admin, "u1", "content").await.unwrap(),
            Role::Content
        );
        assert_eq!(store.find_user("u1").await.unwrap().unwrap().role, Role::Content);

        assert!(matches!(
            service.update_user_role(&admin, "u1", "OWNER").await,
            Err(ServerError::Validation(_))
        ));
        assert!(matches!(
            service.update_user_role(&admin, "ghost", "MEMBER").await,
            Err(ServerError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_set_onboarding_status() {
        let store = seeded().await;
        store.insert_profile(DoctorProfile::new("u1")).await;
        let admin = Caller::new("admin", Role::Admin);
        let service = service(&store, NOW);

        let profile = service
            .set_onboarding_status(&admin, "u1", "completed")
            .await
            .unwrap();
        assert_eq!(profile.onboarding_status, Some(OnboardingStatus::Completed));

        assert!(matches!(
            service.set_onboarding_status(&admin, "u1", "DONE").await,
            Err(ServerError::Validation(_))
        ));
    }
}
