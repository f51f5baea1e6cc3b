//! Closed status variants stored as text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Membership review lifecycle of a profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    /// A reviewer took a decision.
    pub fn is_decided(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

/// Onboarding progress as set by the applicant or forced by an admin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    InProgress,
    Completed,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStatus::InProgress => "IN_PROGRESS",
            OnboardingStatus::Completed => "COMPLETED",
        }
    }
}

/// Status text did not match any known variant.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

impl FromStr for OnboardingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Ok(OnboardingStatus::InProgress),
            "COMPLETED" => Ok(OnboardingStatus::Completed),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
