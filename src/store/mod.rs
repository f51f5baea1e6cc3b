//! Persistence ports and their adapters.
//!
//! Every call is atomic on its own. Operations that touch more than one row
//! family (`commit_review`, `complete_onboarding`) are single calls so that
//! adapters can wrap them in one transaction.
//!
//! Profile writes are column-scoped: a step save never touches the
//! application columns and a decision never touches the applicant details.

mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::notification::Notification;
use crate::profile::{ApplicationStatus, DoctorProfile, OnboardingStatus, ProfileDetails, Review};
use crate::user::{Caller, Role, User};

/// Application decision written by [`ProfileRepository::commit_review`].
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub status: ApplicationStatus,
    pub review: Option<Review>,
    /// Details inserted when the user owns no profile yet. Without them a
    /// missing profile is `ProfileNotFound`.
    pub placeholder: Option<ProfileDetails>,
    /// New role of the profile owner.
    pub role: Option<Role>,
}

impl Decision {
    /// Reviewer stamp is kept only for decided applications.
    pub fn new(status: ApplicationStatus, review: Option<Review>) -> Self {
        Self {
            review: review.filter(|_| status.is_decided()),
            status,
            placeholder: None,
            role: None,
        }
    }

    pub fn with_placeholder(mut self, details: ProfileDetails) -> Self {
        self.placeholder = Some(details);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// Port for account persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID.
    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    /// Every user holding one of `roles`, ordered by ID.
    async fn find_users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>>;

    /// Update the role of a user. Fails with `UserNotFound` on unknown ID.
    async fn update_role(&self, id: &str, role: Role) -> Result<()>;
}

/// Port for doctor profile persistence.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Find the profile owned by `user_id`.
    async fn find_profile(&self, user_id: &str) -> Result<Option<DoctorProfile>>;

    /// Save the applicant `details` of an onboarding step.
    ///
    /// Creates the profile when missing, raises `onboarding_step` to at least
    /// `step` and sets `IN_PROGRESS` only when no status is set yet.
    async fn save_step(
        &self,
        user_id: &str,
        details: &ProfileDetails,
        step: i32,
    ) -> Result<DoctorProfile>;

    /// Write an application decision and, when set, the owner's role, all or
    /// nothing.
    async fn commit_review(&self, user_id: &str, decision: &Decision) -> Result<DoctorProfile>;

    /// Set the onboarding status of an existing profile.
    async fn set_onboarding_status(
        &self,
        user_id: &str,
        status: OnboardingStatus,
    ) -> Result<DoctorProfile>;

    /// Mark user as onboarded and its profile as a completed, pending
    /// application, all or nothing.
    async fn complete_onboarding(&self, user_id: &str) -> Result<DoctorProfile>;
}

/// Port for in-app notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert a notification.
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Newest-first page of notifications for a recipient.
    async fn list_notifications(
        &self,
        recipient_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>>;

    /// Count unread notifications of a recipient.
    async fn count_unread(&self, recipient_id: &str) -> Result<i64>;

    /// Flag a notification as read, filtered by recipient.
    /// Returns affected rows.
    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<u64>;
}

/// Port for the session provider.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a session token into its owner.
    async fn caller_for_token(&self, token: &str) -> Result<Option<Caller>>;
}

/// Equipment and system eligibility declared for a team.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub team_id: String,
    pub systems: Vec<String>,
}

/// Port for teams.
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// Team the user belongs to, if any.
    async fn find_team_of(&self, user_id: &str) -> Result<Option<String>>;

    /// Insert or replace the eligibility of a team.
    async fn upsert_eligibility(&self, eligibility: &Eligibility) -> Result<()>;

    /// Eligibility of a team.
    async fn find_eligibility(&self, team_id: &str) -> Result<Option<Eligibility>>;
}

/// Whole relational store.
pub trait Store:
    UserRepository + ProfileRepository + NotificationRepository + SessionStore + TeamRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + ProfileRepository
        + NotificationRepository
        + SessionStore
        + TeamRepository
{
}
