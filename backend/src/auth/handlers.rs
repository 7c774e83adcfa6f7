//! Handler functions for session endpoints.
//!
//! These functions open and close the caller's session through
//! `auth::service` and report the action state loaded for it.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::middleware::BearerToken;
use crate::auth::models::SessionResponse;
use crate::errors::{AppError, Result};
use crate::state::AppState;

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<SessionResponse>> {
    let store = state.sessions.sign_in(&token).await?;
    let user_id = store.user_id().await.ok_or(AppError::AuthRequired)?;

    Ok(Json(SessionResponse {
        user_id,
        actions: store.snapshot().await,
    }))
}

pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> StatusCode {
    state.sessions.sign_out(&token).await;
    StatusCode::NO_CONTENT
}
