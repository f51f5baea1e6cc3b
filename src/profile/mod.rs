//! Paediatric doctor profile, the onboarding subject.

mod status;

pub use status::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::User;

/// Placeholder used when a profile is synthesised without applicant input.
pub const UNKNOWN: &str = "Unknown";

/// Reviewer stamp. Reviewer and time only ever exist together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "reviewedBy")]
    pub by: String,
    #[serde(rename = "reviewedAt")]
    pub at: DateTime<Utc>,
}

/// Descriptive fields filled through the onboarding steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDetails {
    // identity.
    pub full_name_english: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name_arabic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_stage: Option<String>,
    // education.
    pub university: String,
    pub graduation_country: String,
    pub graduation_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    pub qualifications: Vec<String>,
    // subspecialty.
    pub subspecialties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subspecialty_certification: Option<String>,
    // career.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_country: Option<String>,
    // research.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_interests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publications: Option<String>,
    // personal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spouse_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_count: Option<i32>,
    pub photos: Vec<String>,
    // contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    // attachments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_url: Option<String>,
    pub papers: Vec<String>,
    // activity.
    pub skills: Vec<String>,
}

impl ProfileDetails {
    /// Minimal details for a user that never went through onboarding.
    pub fn placeholder(user: &User) -> Self {
        Self {
            full_name_english: user
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            university: UNKNOWN.to_owned(),
            graduation_country: UNKNOWN.to_owned(),
            contact_email: user.email.clone(),
            contact_phone: user.phone.clone(),
            ..Default::default()
        }
    }
}

/// Profile as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub user_id: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
    pub onboarding_status: Option<OnboardingStatus>,
    pub onboarding_step: i32,
    pub application_status: ApplicationStatus,
    #[serde(flatten)]
    pub review: Option<Review>,
}

impl DoctorProfile {
    /// Create an empty, pending profile for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            details: ProfileDetails::default(),
            onboarding_status: None,
            onboarding_step: 0,
            application_status: ApplicationStatus::Pending,
            review: None,
        }
    }

    /// Synthesise a profile from the account alone.
    pub fn synthesize(user: &User) -> Self {
        Self {
            details: ProfileDetails::placeholder(user),
            ..Self::new(user.id.clone())
        }
    }

    /// Record the last onboarding step reached. Never moves backwards.
    pub fn reach_step(&mut self, step: i32) {
        self.onboarding_step = self.onboarding_step.max(step);
    }

    /// Apply an application transition.
    ///
    /// Reviewer stamp is kept only for decided applications.
    pub fn transition(&mut self, status: ApplicationStatus, review: Option<Review>) {
        self.review = if status.is_decided() { review } else { None };
        self.application_status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> User {
        User {
            id: "u1".into(),
            name: name.map(Into::into),
            email: Some("doc@example.org".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_synthesize_uses_name() {
        let profile = DoctorProfile::synthesize(&user(Some("Dr. Hana")));
        assert_eq!(profile.details.full_name_english, "Dr. Hana");
        assert_eq!(profile.details.university, UNKNOWN);
        assert_eq!(profile.details.contact_email.as_deref(), Some("doc@example.org"));
        assert_eq!(profile.application_status, ApplicationStatus::Pending);
    }

    #[test]
    fn test_synthesize_without_name() {
        let profile = DoctorProfile::synthesize(&user(None));
        assert_eq!(profile.details.full_name_english, UNKNOWN);
    }

    #[test]
    fn test_pending_drops_review() {
        let mut profile = DoctorProfile::new("u1");
        let review = Review {
            by: "admin".into(),
            at: Utc::now(),
        };

        profile.transition(ApplicationStatus::Rejected, Some(review.clone()));
        assert_eq!(profile.review, Some(review.clone()));

        profile.transition(ApplicationStatus::Pending, Some(review));
        assert_eq!(profile.review, None);
    }

    #[test]
    fn test_step_never_regresses() {
        let mut profile = DoctorProfile::new("u1");
        profile.reach_step(4);
        profile.reach_step(2);
        assert_eq!(profile.onboarding_step, 4);
    }

    #[test]
    fn test_serialized_review_fields() {
        let mut profile = DoctorProfile::new("u1");
        profile.transition(
            ApplicationStatus::Approved,
            Some(Review {
                by: "admin".into(),
                at: Utc::now(),
            }),
        );
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["applicationStatus"], "APPROVED");
        assert_eq!(json["reviewedBy"], "admin");
        assert!(json.get("reviewedAt").is_some());
    }
}
