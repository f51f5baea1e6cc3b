//! Membership admin routes. Reviewer role required.

use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::profile::DoctorProfile;
use crate::router::Valid;
use crate::user::{Caller, Role};

#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct StatusBody {
    #[validate(length(min = 1, max = 32, message = "Status is required."))]
    status: String,
}

#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct RoleBody {
    #[validate(length(min = 1, max = 32, message = "Role is required."))]
    role: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdated {
    user_id: String,
    role: Role,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /membership/:ID/approve` goes to `approve`.
        .route("/{user_id}/approve", post(approve))
        .route("/{user_id}/reject", post(reject))
        .route("/{user_id}/redo", post(redo))
        // `PUT /membership/:ID/onboarding-status` goes to `onboarding_status`.
        .route("/{user_id}/onboarding-status", put(onboarding_status))
        // `PUT /membership/:ID/role` goes to `role`. Admin only.
        .route("/{user_id}/role", put(role))
}

async fn approve(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> Result<Json<DoctorProfile>> {
    Ok(Json(state.review.approve(&caller, &user_id).await?))
}

async fn reject(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> Result<Json<DoctorProfile>> {
    Ok(Json(state.review.reject(&caller, &user_id).await?))
}

async fn redo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> Result<Json<DoctorProfile>> {
    Ok(Json(state.review.redo(&caller, &user_id).await?))
}

async fn onboarding_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
    Valid(body): Valid<StatusBody>,
) -> Result<Json<DoctorProfile>> {
    Ok(Json(
        state
            .review
            .set_onboarding_status(&caller, &user_id, &body.status)
            .await?,
    ))
}

async fn role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
    Valid(body): Valid<RoleBody>,
) -> Result<Json<RoleUpdated>> {
    let role = state
        .review
        .update_user_role(&caller, &user_id, &body.role)
        .await?;
    Ok(Json(RoleUpdated { user_id, role }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::router::tests::{ADMIN_TOKEN, DOCTOR_TOKEN, SECRETARY_TOKEN, state};
    use crate::store::UserRepository;
    use crate::user::Role;
    use crate::*;

    #[tokio::test]
    async fn test_review_cycle() {
        let (state, store) = state().await;
        let app = app(state);

        let response = make_request(
            Some(SECRETARY_TOKEN),
            app.clone(),
            Method::POST,
            "/membership/doctor/approve",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let profile: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(profile["applicationStatus"], "APPROVED");
        assert_eq!(profile["reviewedBy"], "secretary");
        assert_eq!(store.find_user("doctor").await.unwrap().unwrap().role, Role::Member);

        let response = make_request(
            Some(ADMIN_TOKEN),
            app.clone(),
            Method::POST,
            "/membership/doctor/reject",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(
            Some(ADMIN_TOKEN),
            app,
            Method::POST,
            "/membership/doctor/redo",
            String::default(),
        )
        .await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let profile: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(profile["applicationStatus"], "PENDING");
        assert!(profile.get("reviewedBy").is_none());
    }

    #[tokio::test]
    async fn test_applicant_cannot_review() {
        let (state, store) = state().await;
        let response = make_request(
            Some(DOCTOR_TOKEN),
            app(state),
            Method::POST,
            "/membership/doctor/approve",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.profile_count().await, 0);
    }

    #[tokio::test]
    async fn test_reject_unknown_profile() {
        let (state, _) = state().await;
        let response = make_request(
            Some(ADMIN_TOKEN),
            app(state),
            Method::POST,
            "/membership/doctor/reject",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_role() {
        let (state, store) = state().await;
        let app = app(state);

        let response = make_request(
            Some(SECRETARY_TOKEN),
            app.clone(),
            Method::PUT,
            "/membership/doctor/role",
            json!({ "role": "ADMIN" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = make_request(
            Some(ADMIN_TOKEN),
            app.clone(),
            Method::PUT,
            "/membership/doctor/role",
            json!({ "role": "FINANCE" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.find_user("doctor").await.unwrap().unwrap().role, Role::Finance);

        let response = make_request(
            Some(ADMIN_TOKEN),
            app,
            Method::PUT,
            "/membership/doctor/role",
            json!({ "role": "" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_onboarding_status() {
        let (state, _) = state().await;
        let app = app(state);

        make_request(
            Some(ADMIN_TOKEN),
            app.clone(),
            Method::POST,
            "/membership/doctor/approve",
            String::default(),
        )
        .await;

        let response = make_request(
            Some(ADMIN_TOKEN),
            app.clone(),
            Method::PUT,
            "/membership/doctor/onboarding-status",
            json!({ "status": "COMPLETED" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let profile: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(profile["onboardingStatus"], "COMPLETED");

        let response = make_request(
            Some(ADMIN_TOKEN),
            app,
            Method::PUT,
            "/membership/doctor/onboarding-status",
            json!({ "status": "ARCHIVED" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
