use serde::Serialize;

use super::OnboardingService;
use crate::error::{Result, ServerError};
use crate::notification::Applicant;
use crate::profile::{
    ApplicationStatus, DoctorProfile, OnboardingStatus, ProfileDetails, Review,
};
use crate::store::{ProfileRepository, UserRepository};
use crate::telemetry;
use crate::user::{Caller, Role, User};

const REVIEW_PATH: &str = "/onboarding/review";
const MEMBERSHIP_PATH: &str = "/membership";

/// Account and profile merged into one flat object.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub onboarded: bool,
    #[serde(flatten)]
    pub details: ProfileDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_status: Option<OnboardingStatus>,
    pub onboarding_step: i32,
    pub application_status: ApplicationStatus,
    #[serde(flatten)]
    pub review: Option<Review>,
}

impl ReviewSummary {
    fn merge(user: User, profile: DoctorProfile) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            onboarded: user.onboarded,
            details: profile.details,
            onboarding_status: profile.onboarding_status,
            onboarding_step: profile.onboarding_step,
            application_status: profile.application_status,
            review: profile.review,
        }
    }
}

/// Applicant as announced to reviewers. Profile contact values win over the
/// account ones.
fn applicant(user: &User, profile: &DoctorProfile) -> Applicant {
    let details = &profile.details;
    let name = Some(details.full_name_english.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .or_else(|| user.name.clone())
        .unwrap_or_else(|| crate::profile::UNKNOWN.to_owned());

    Applicant {
        id: user.id.clone(),
        name,
        email: details.contact_email.clone().or_else(|| user.email.clone()),
        phone: details.contact_phone.clone().or_else(|| user.phone.clone()),
        whatsapp: details.whatsapp.clone(),
    }
}

impl OnboardingService {
    /// Everything the applicant entered, for the final review page.
    pub async fn fetch_user_for_review(&self, caller: &Caller) -> Result<ReviewSummary> {
        let user = self
            .store
            .find_user(&caller.id)
            .await?
            .ok_or(ServerError::UserNotFound)?;
        let profile = self
            .store
            .find_profile(&caller.id)
            .await?
            .ok_or(ServerError::ProfileNotFound)?;

        Ok(ReviewSummary::merge(user, profile))
    }

    /// Submit the application for review.
    ///
    /// Reviewers are then notified. A failed notification is logged and does
    /// not undo the submission.
    pub async fn complete_onboarding(&self, caller: &Caller) -> Result<DoctorProfile> {
        let user = self
            .store
            .find_user(&caller.id)
            .await?
            .ok_or(ServerError::UserNotFound)?;
        let profile = self.store.complete_onboarding(&caller.id).await?;

        tracing::info!(user_id = caller.id, "onboarding completed");
        telemetry::onboarding_submitted();

        match self
            .notifier
            .onboarding_submitted(&applicant(&user, &profile))
            .await
        {
            Ok(count) => tracing::debug!(user_id = caller.id, count, "reviewers notified"),
            Err(err) => {
                tracing::error!(user_id = caller.id, error = %err, "onboarding notification failed")
            },
        }

        self.revalidator.revalidate(REVIEW_PATH);
        self.revalidator.revalidate(MEMBERSHIP_PATH);

        Ok(profile)
    }
}
