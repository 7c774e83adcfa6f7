//! Module for the signed-in user's own data.
//!
//! This module exposes the caller's upvoted and saved tools, separate from
//! the session endpoints of the `auth` module.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::state::AppState;

pub mod handlers;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new().route("/actions", get(handlers::actions))
}
