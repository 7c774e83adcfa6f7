//! Handler functions for the user API endpoints.

use axum::Json;

use crate::auth::middleware::CurrentSession;
use crate::auth::models::{ActionState, ActionsResponse};

/// The caller's upvoted and saved tools; empty for signed-out callers.
pub async fn actions(session: Option<CurrentSession>) -> Json<ActionsResponse> {
    let response = match session {
        Some(session) => ActionsResponse {
            signed_in: session.store.is_signed_in().await,
            actions: session.store.snapshot().await,
        },
        None => ActionsResponse {
            signed_in: false,
            actions: ActionState::default(),
        },
    };
    Json(response)
}
