//! Applicant onboarding routes.

use std::collections::HashMap;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};

use crate::error::Result;
use crate::onboarding::{
    ActivityForm, AttachmentForm, ContactForm, EducationForm, EligibilityForm, InformationForm,
    ReviewSummary, StepSaved,
};
use crate::profile::DoctorProfile;
use crate::router::Valid;
use crate::steps::{self, Progress, Snapshot, Step};
use crate::store::Eligibility;
use crate::user::Caller;
use crate::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /onboarding/review` goes to `review`.
        .route("/review", get(review))
        // `POST /onboarding/complete` goes to `complete`.
        .route("/complete", post(complete))
        .route("/progress", post(progress))
        .route("/contact", put(contact))
        .route("/information", put(information))
        .route("/education", put(education))
        .route("/activity", put(activity))
        .route("/attachment", put(attachment))
        .route("/eligibility", put(eligibility))
}

async fn review(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ReviewSummary>> {
    Ok(Json(state.onboarding.fetch_user_for_review(&caller).await?))
}

async fn complete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<DoctorProfile>> {
    Ok(Json(state.onboarding.complete_onboarding(&caller).await?))
}

/// Classify the posted step snapshots. Keys are step names.
async fn progress(Json(body): Json<HashMap<String, Snapshot>>) -> Result<Json<Progress>> {
    let snapshots = body
        .into_iter()
        .map(|(step, snapshot)| {
            step.parse::<Step>()
                .map(|step| (step, snapshot))
                .map_err(|_| ServerError::field("step", "step", "Unknown onboarding step."))
        })
        .collect::<Result<HashMap<Step, Snapshot>>>()?;

    Ok(Json(steps::progress(&snapshots)))
}

async fn contact(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<ContactForm>,
) -> Result<Json<StepSaved>> {
    Ok(Json(state.onboarding.submit_contact(&caller, form).await?))
}

async fn information(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<InformationForm>,
) -> Result<Json<StepSaved>> {
    Ok(Json(state.onboarding.submit_information(&caller, form).await?))
}

async fn education(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<EducationForm>,
) -> Result<Json<StepSaved>> {
    Ok(Json(state.onboarding.submit_education(&caller, form).await?))
}

async fn activity(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<ActivityForm>,
) -> Result<Json<StepSaved>> {
    Ok(Json(state.onboarding.submit_activity(&caller, form).await?))
}

async fn attachment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<AttachmentForm>,
) -> Result<Json<StepSaved>> {
    Ok(Json(state.onboarding.submit_attachment(&caller, form).await?))
}

async fn eligibility(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Valid(form): Valid<EligibilityForm>,
) -> Result<Json<Eligibility>> {
    Ok(Json(state.onboarding.submit_eligibility(&caller, form).await?))
}
