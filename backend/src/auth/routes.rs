//! Defines the HTTP routes specifically for authentication.
//!
//! These routes open and close sessions and are nested under `/api/auth` by
//! the main Axum router.

use std::sync::Arc;

use axum::{routing::post, Router};

use super::handlers::{sign_in, sign_out};
use crate::state::AppState;

pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
}
