//! In-memory store used for local development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Decision, Eligibility, NotificationRepository, ProfileRepository, SessionStore, TeamRepository,
    UserRepository,
};
use crate::error::{Result, ServerError};
use crate::notification::Notification;
use crate::profile::{ApplicationStatus, DoctorProfile, OnboardingStatus, ProfileDetails};
use crate::user::{Caller, Role, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<String, User>,
    profiles: HashMap<String, DoctorProfile>,
    notifications: Vec<Notification>,
    sessions: HashMap<String, String>,
    members: HashMap<String, String>,
    eligibility: HashMap<String, Eligibility>,
}

/// Store keeping every table behind one lock.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id.clone(), user);
    }

    /// Open a session for an existing user.
    pub async fn insert_session(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.tables
            .write()
            .await
            .sessions
            .insert(token.into(), user_id.into());
    }

    /// Register `user_id` as a member of `team_id`.
    pub async fn add_team_member(&self, team_id: impl Into<String>, user_id: impl Into<String>) {
        self.tables
            .write()
            .await
            .members
            .insert(user_id.into(), team_id.into());
    }

    /// Insert or replace a profile as is.
    pub async fn insert_profile(&self, profile: DoctorProfile) {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    /// Every stored notification, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.tables.read().await.notifications.clone()
    }

    /// Number of stored profiles.
    pub async fn profile_count(&self) -> usize {
        self.tables.read().await.profiles.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|user| roles.contains(&user.role))
            .cloned()
            .collect())
    }

    async fn update_role(&self, id: &str, role: Role) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or(ServerError::UserNotFound)?;
        user.role = role;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<DoctorProfile>> {
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn save_step(
        &self,
        user_id: &str,
        details: &ProfileDetails,
        step: i32,
    ) -> Result<DoctorProfile> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(user_id) {
            return Err(ServerError::UserNotFound);
        }
        let profile = tables
            .profiles
            .entry(user_id.to_owned())
            .or_insert_with(|| DoctorProfile::new(user_id));

        profile.details = details.clone();
        profile.reach_step(step);
        if profile.onboarding_status.is_none() {
            profile.onboarding_status = Some(OnboardingStatus::InProgress);
        }
        Ok(profile.clone())
    }

    async fn commit_review(&self, user_id: &str, decision: &Decision) -> Result<DoctorProfile> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(user_id) {
            return Err(ServerError::UserNotFound);
        }

        if !tables.profiles.contains_key(user_id) {
            let Some(details) = &decision.placeholder else {
                return Err(ServerError::ProfileNotFound);
            };
            let profile = DoctorProfile {
                details: details.clone(),
                ..DoctorProfile::new(user_id)
            };
            tables.profiles.insert(user_id.to_owned(), profile);
        }

        let profile = tables
            .profiles
            .get_mut(user_id)
            .ok_or(ServerError::ProfileNotFound)?;
        profile.transition(decision.status, decision.review.clone());
        let profile = profile.clone();

        if let (Some(role), Some(user)) = (decision.role, tables.users.get_mut(user_id)) {
            user.role = role;
        }
        Ok(profile)
    }

    async fn set_onboarding_status(
        &self,
        user_id: &str,
        status: OnboardingStatus,
    ) -> Result<DoctorProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get_mut(user_id)
            .ok_or(ServerError::ProfileNotFound)?;
        profile.onboarding_status = Some(status);
        Ok(profile.clone())
    }

    async fn complete_onboarding(&self, user_id: &str) -> Result<DoctorProfile> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(user_id) {
            return Err(ServerError::UserNotFound);
        }
        let profile = tables
            .profiles
            .get_mut(user_id)
            .ok_or(ServerError::ProfileNotFound)?;
        profile.onboarding_status = Some(OnboardingStatus::Completed);
        profile.transition(ApplicationStatus::Pending, None);
        let profile = profile.clone();

        if let Some(user) = tables.users.get_mut(user_id) {
            user.onboarded = true;
        }
        Ok(profile)
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.tables
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut notifications: Vec<_> = tables
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        // stable sort keeps insertion order among equal timestamps.
        notifications.reverse();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(notifications
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or_default())
            .take(usize::try_from(limit).unwrap_or_default())
            .collect())
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<i64> {
        let count = self
            .tables
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.id == id && n.recipient_id == recipient_id)
        {
            notification.is_read = true;
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn caller_for_token(&self, token: &str) -> Result<Option<Caller>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(token)
            .and_then(|user_id| tables.users.get(user_id))
            .cloned()
            .map(Caller::from))
    }
}

#[async_trait]
impl TeamRepository for MemoryStore {
    async fn find_team_of(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.tables.read().await.members.get(user_id).cloned())
    }

    async fn upsert_eligibility(&self, eligibility: &Eligibility) -> Result<()> {
        self.tables
            .write()
            .await
            .eligibility
            .insert(eligibility.team_id.clone(), eligibility.clone());
        Ok(())
    }

    async fn find_eligibility(&self, team_id: &str) -> Result<Option<Eligibility>> {
        Ok(self.tables.read().await.eligibility.get(team_id).cloned())
    }
}
