//! Applicant side of the membership flow.
//!
//! Each form step upserts its own subset of the caller's profile. Once every
//! step is filled, the applicant reviews the merged summary and submits it.

mod forms;
mod submit;

pub use forms::*;
pub use submit::*;

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, ServerError};
use crate::notification::ReviewNotifier;
use crate::profile::ProfileDetails;
use crate::revalidate::Revalidator;
use crate::steps::Step;
use crate::store::{Eligibility, ProfileRepository, Store, TeamRepository, UserRepository};
use crate::telemetry;
use crate::user::Caller;

const ONBOARDING_PATH: &str = "/onboarding";

/// Result of a saved step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSaved {
    pub step: Step,
    pub onboarding_step: i32,
}

/// Onboarding actions of the caller.
#[derive(Clone)]
pub struct OnboardingService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn ReviewNotifier>,
    revalidator: Arc<dyn Revalidator>,
}

impl OnboardingService {
    /// Create a new [`OnboardingService`].
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn ReviewNotifier>,
        revalidator: Arc<dyn Revalidator>,
    ) -> Self {
        Self {
            store,
            notifier,
            revalidator,
        }
    }

    async fn save_step<F>(&self, caller: &Caller, step: Step, apply: F) -> Result<StepSaved>
    where
        F: FnOnce(&mut ProfileDetails) + Send,
    {
        if self.store.find_user(&caller.id).await?.is_none() {
            return Err(ServerError::UserNotFound);
        }

        let mut details = self
            .store
            .find_profile(&caller.id)
            .await?
            .map(|profile| profile.details)
            .unwrap_or_default();
        apply(&mut details);

        let profile = self
            .store
            .save_step(&caller.id, &details, step.number())
            .await?;

        tracing::debug!(
            user_id = caller.id,
            %step,
            onboarding_step = profile.onboarding_step,
            "onboarding step saved"
        );
        telemetry::step_saved(step.as_str());
        self.revalidator.revalidate(ONBOARDING_PATH);

        Ok(StepSaved {
            step,
            onboarding_step: profile.onboarding_step,
        })
    }

    pub async fn submit_contact(&self, caller: &Caller, form: ContactForm) -> Result<StepSaved> {
        self.save_step(caller, Step::Contact, |details| form.apply(details))
            .await
    }

    pub async fn submit_information(
        &self,
        caller: &Caller,
        form: InformationForm,
    ) -> Result<StepSaved> {
        self.save_step(caller, Step::Information, |details| form.apply(details))
            .await
    }

    pub async fn submit_education(&self, caller: &Caller, form: EducationForm) -> Result<StepSaved> {
        self.save_step(caller, Step::Education, |details| form.apply(details))
            .await
    }

    pub async fn submit_activity(&self, caller: &Caller, form: ActivityForm) -> Result<StepSaved> {
        self.save_step(caller, Step::Activity, |details| form.apply(details))
            .await
    }

    pub async fn submit_attachment(
        &self,
        caller: &Caller,
        form: AttachmentForm,
    ) -> Result<StepSaved> {
        self.save_step(caller, Step::Attachment, |details| form.apply(details))
            .await
    }

    /// Declare the systems available to the caller's team.
    pub async fn submit_eligibility(
        &self,
        caller: &Caller,
        form: EligibilityForm,
    ) -> Result<Eligibility> {
        let team_id = self
            .store
            .find_team_of(&caller.id)
            .await?
            .ok_or(ServerError::TeamNotFound)?;

        let eligibility = Eligibility {
            team_id,
            systems: form.systems,
        };
        self.store.upsert_eligibility(&eligibility).await?;

        tracing::debug!(user_id = caller.id, team_id = eligibility.team_id, "team eligibility saved");
        self.revalidator.revalidate(ONBOARDING_PATH);

        Ok(eligibility)
    }
}
