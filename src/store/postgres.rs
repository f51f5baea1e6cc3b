//! PostgreSQL adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use super::{
    Decision, Eligibility, NotificationRepository, ProfileRepository, SessionStore, TeamRepository,
    UserRepository,
};
use crate::error::{Result, ServerError};
use crate::notification::Notification;
use crate::profile::{ApplicationStatus, DoctorProfile, OnboardingStatus, ProfileDetails, Review};
use crate::user::{Caller, Role, User};

const USER_COLUMNS: &str = "id, name, email, phone, role, onboarded";
const PROFILE_COLUMNS: &str = "user_id, details, onboarding_status, onboarding_step, \
     application_status, reviewed_by, reviewed_at";
const NOTIFICATION_COLUMNS: &str =
    "id, type, title, content, recipient_id, is_read, metadata, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    role: String,
    onboarded: bool,
}

impl TryFrom<UserRow> for User {
    type Error = ServerError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: row.role.parse().map_err(|err: crate::user::UnknownRole| {
                ServerError::Internal {
                    details: err.to_string(),
                }
            })?,
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            onboarded: row.onboarded,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    details: Json<ProfileDetails>,
    onboarding_status: Option<String>,
    onboarding_step: i32,
    application_status: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProfileRow> for DoctorProfile {
    type Error = ServerError;

    fn try_from(row: ProfileRow) -> Result<Self> {
        let corrupted = |err: crate::profile::UnknownStatus| ServerError::Internal {
            details: err.to_string(),
        };

        Ok(DoctorProfile {
            onboarding_status: row
                .onboarding_status
                .as_deref()
                .map(str::parse::<OnboardingStatus>)
                .transpose()
                .map_err(corrupted)?,
            application_status: row
                .application_status
                .parse::<ApplicationStatus>()
                .map_err(corrupted)?,
            review: row
                .reviewed_by
                .zip(row.reviewed_at)
                .map(|(by, at)| Review { by, at }),
            user_id: row.user_id,
            details: row.details.0,
            onboarding_step: row.onboarding_step,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    #[sqlx(rename = "type")]
    r#type: String,
    title: String,
    content: String,
    recipient_id: String,
    is_read: bool,
    metadata: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ServerError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            r#type: row.r#type.parse().map_err(|err: crate::profile::UnknownStatus| {
                ServerError::Internal {
                    details: err.to_string(),
                }
            })?,
            id: row.id,
            title: row.title,
            content: row.content,
            recipient_id: row.recipient_id,
            is_read: row.is_read,
            metadata: row.metadata.0,
            created_at: row.created_at,
        })
    }
}

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new [`PostgresStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        let roles: Vec<&str> = roles.iter().map(Role::as_str).collect();
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ANY($1) ORDER BY id");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(roles)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_role(&self, id: &str, role: Role) -> Result<()> {
        let result = sqlx::query(r#"UPDATE users SET role = $1 WHERE id = $2"#)
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::UserNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PostgresStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<DoctorProfile>> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM doctor_profiles WHERE user_id = $1");
        sqlx::query_as::<_, ProfileRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(DoctorProfile::try_from)
            .transpose()
    }

    async fn save_step(
        &self,
        user_id: &str,
        details: &ProfileDetails,
        step: i32,
    ) -> Result<DoctorProfile> {
        let query = format!(
            r#"INSERT INTO doctor_profiles (user_id, details, onboarding_status, onboarding_step)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id) DO UPDATE SET
                    details = EXCLUDED.details,
                    onboarding_status = COALESCE(doctor_profiles.onboarding_status, EXCLUDED.onboarding_status),
                    onboarding_step = GREATEST(doctor_profiles.onboarding_step, EXCLUDED.onboarding_step),
                    updated_at = NOW()
                RETURNING {PROFILE_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ProfileRow>(&query)
            .bind(user_id)
            .bind(Json(details))
            .bind(OnboardingStatus::InProgress.as_str())
            .bind(step)
            .fetch_one(&self.pool)
            .await?;

        DoctorProfile::try_from(row)
    }

    async fn commit_review(&self, user_id: &str, decision: &Decision) -> Result<DoctorProfile> {
        let (reviewed_by, reviewed_at) = match &decision.review {
            Some(review) => (Some(review.by.as_str()), Some(review.at)),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        if let Some(role) = decision.role {
            let result = sqlx::query(r#"UPDATE users SET role = $1 WHERE id = $2"#)
                .bind(role.as_str())
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() != 1 {
                tx.rollback().await?;
                return Err(ServerError::UserNotFound);
            }
        }

        let row = match &decision.placeholder {
            Some(details) => {
                let query = format!(
                    r#"INSERT INTO doctor_profiles (user_id, details, application_status, reviewed_by, reviewed_at)
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (user_id) DO UPDATE SET
                            application_status = EXCLUDED.application_status,
                            reviewed_by = EXCLUDED.reviewed_by,
                            reviewed_at = EXCLUDED.reviewed_at,
                            updated_at = NOW()
                        RETURNING {PROFILE_COLUMNS}"#
                );
                sqlx::query_as::<_, ProfileRow>(&query)
                    .bind(user_id)
                    .bind(Json(details))
                    .bind(decision.status.as_str())
                    .bind(reviewed_by)
                    .bind(reviewed_at)
                    .fetch_optional(&mut *tx)
                    .await?
            },
            None => {
                let query = format!(
                    r#"UPDATE doctor_profiles
                        SET application_status = $2, reviewed_by = $3, reviewed_at = $4, updated_at = NOW()
                        WHERE user_id = $1
                        RETURNING {PROFILE_COLUMNS}"#
                );
                sqlx::query_as::<_, ProfileRow>(&query)
                    .bind(user_id)
                    .bind(decision.status.as_str())
                    .bind(reviewed_by)
                    .bind(reviewed_at)
                    .fetch_optional(&mut *tx)
                    .await?
            },
        };

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(ServerError::ProfileNotFound);
        };

        tx.commit().await?;
        DoctorProfile::try_from(row)
    }

    async fn set_onboarding_status(
        &self,
        user_id: &str,
        status: OnboardingStatus,
    ) -> Result<DoctorProfile> {
        let query = format!(
            r#"UPDATE doctor_profiles SET onboarding_status = $2, updated_at = NOW()
                WHERE user_id = $1
                RETURNING {PROFILE_COLUMNS}"#
        );
        sqlx::query_as::<_, ProfileRow>(&query)
            .bind(user_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(DoctorProfile::try_from)
            .transpose()?
            .ok_or(ServerError::ProfileNotFound)
    }

    async fn complete_onboarding(&self, user_id: &str) -> Result<DoctorProfile> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(r#"UPDATE users SET onboarded = TRUE WHERE id = $1"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(ServerError::UserNotFound);
        }

        let query = format!(
            r#"UPDATE doctor_profiles
                SET onboarding_status = $1, application_status = $2,
                    reviewed_by = NULL, reviewed_at = NULL, updated_at = NOW()
                WHERE user_id = $3
                RETURNING {PROFILE_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ProfileRow>(&query)
            .bind(OnboardingStatus::Completed.as_str())
            .bind(ApplicationStatus::Pending.as_str())
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(ServerError::ProfileNotFound);
        };

        tx.commit().await?;
        DoctorProfile::try_from(row)
    }
}

#[async_trait]
impl NotificationRepository for PostgresStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO notifications (id, type, title, content, recipient_id, is_read, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&notification.id)
        .bind(notification.r#type.as_str())
        .bind(&notification.title)
        .bind(&notification.content)
        .bind(&notification.recipient_id)
        .bind(notification.is_read)
        .bind(Json(&notification.metadata))
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(recipient_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE"#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2"#,
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn caller_for_token(&self, token: &str) -> Result<Option<Caller>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT u.id, u.name, u.email, u.phone, u.role, u.onboarded
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token = $1 AND s.expires_at > NOW()"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| User::try_from(row).map(Caller::from))
            .transpose()
    }
}

#[async_trait]
impl TeamRepository for PostgresStore {
    async fn find_team_of(&self, user_id: &str) -> Result<Option<String>> {
        Ok(sqlx::query_scalar(
            r#"SELECT team_id FROM team_members WHERE user_id = $1 ORDER BY joined_at LIMIT 1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_eligibility(&self, eligibility: &Eligibility) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO team_eligibility (team_id, systems) VALUES ($1, $2)
                ON CONFLICT (team_id) DO UPDATE SET systems = EXCLUDED.systems, updated_at = NOW()"#,
        )
        .bind(&eligibility.team_id)
        .bind(&eligibility.systems)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_eligibility(&self, team_id: &str) -> Result<Option<Eligibility>> {
        let systems: Option<Vec<String>> =
            sqlx::query_scalar(r#"SELECT systems FROM team_eligibility WHERE team_id = $1"#)
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(systems.map(|systems| Eligibility {
            team_id: team_id.to_owned(),
            systems,
        }))
    }
}
