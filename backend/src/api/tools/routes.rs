//! Defines the HTTP routes for tool pages and their actions.
//!
//! `:id` is the page slug for the lookup route and the canonical target id
//! for every action route.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{resolve_tool, save_tool, upvote_tool, vote_stream};
use crate::state::AppState;

pub fn tools_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(resolve_tool))
        .route("/:id/upvote", post(upvote_tool))
        .route("/:id/save", post(save_tool))
        .route("/:id/votes", get(vote_stream))
}
