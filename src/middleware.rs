//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::store::SessionStore;
use crate::user::Caller;

const BEARER: &str = "Bearer ";

/// Resolve the session token into a [`Caller`] extension.
pub async fn auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServerError::Unauthorized)?;

    let caller = state
        .store
        .caller_for_token(token)
        .await?
        .ok_or(ServerError::Unauthorized)?;

    tracing::trace!(user_id = caller.id, role = %caller.role, "session resolved");

    req.extensions_mut().insert::<Caller>(caller);
    Ok(next.run(req).await)
}
