//! Caller's in-app notifications.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::notification::Notification;
use crate::user::Caller;

#[derive(Debug, Default, Deserialize)]
pub struct Page {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Unread {
    count: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /notifications?limit=20&offset=0` goes to `list`.
        .route("/", get(list))
        .route("/unread", get(unread))
        // `POST /notifications/:ID/read` goes to `read`.
        .route("/{id}/read", post(read))
}

async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.inbox.list(&caller, page.limit, page.offset).await?))
}

async fn unread(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Unread>> {
    let count = state.inbox.unread_count(&caller).await?;
    Ok(Json(Unread { count }))
}

async fn read(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.inbox.mark_as_read(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
