//! Handler functions for tool pages and their vote/save actions.
//!
//! A page is looked up by whatever slug the route carried; actions always
//! take the canonical `target_id` the lookup returned.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Serialize;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, warn};

use crate::auth::middleware::CurrentSession;
use crate::auth::models::UpvoteRequest;
use crate::errors::{AppError, Result};
use crate::services::action_store::{SaveOutcome, VoteOutcome};
use crate::services::identity_resolver::ResolvedEntity;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    #[serde(flatten)]
    pub resolved: ResolvedEntity,
    pub upvoted: bool,
    pub saved: bool,
}

pub async fn resolve_tool(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    session: Option<CurrentSession>,
) -> Result<Json<ToolResponse>> {
    // Without any listings no slug is known to be sponsored; resolve directly.
    let listings = match state.sponsored.listings().await {
        Ok(listings) => listings,
        Err(err) => {
            warn!(%slug, %err, "sponsored listings unavailable, resolving directly");
            Arc::default()
        }
    };
    let resolved = state
        .resolver
        .resolve(&slug, &listings)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tool '{slug}'")))?;

    let (upvoted, saved) = match &session {
        Some(session) => (
            session.store.is_upvoted(&resolved.target_id).await,
            session.store.is_saved(&resolved.target_id).await,
        ),
        None => (false, false),
    };

    Ok(Json(ToolResponse {
        resolved,
        upvoted,
        saved,
    }))
}

pub async fn upvote_tool(
    Path(id): Path<String>,
    session: CurrentSession,
    body: Option<Json<UpvoteRequest>>,
) -> Result<Json<VoteOutcome>> {
    let current_count = body.map(|Json(request)| request.current_count).unwrap_or_default();
    let outcome = session.store.toggle_upvote(&id, current_count).await?;
    Ok(Json(outcome))
}

pub async fn save_tool(Path(id): Path<String>, session: CurrentSession) -> Result<Json<SaveOutcome>> {
    Ok(Json(session.store.toggle_save(&id).await?))
}

/// Server-sent vote events for one entity within the caller's session.
pub async fn vote_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    session: CurrentSession,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    state.config.id_policy.check(&id)?;
    debug!(entity_id = %id, "vote stream opened");

    let events = BroadcastStream::new(session.store.vote_sync().subscribe()).filter_map(move |message| match message {
        Ok(event) if event.entity_id == id => Event::default()
            .event("vote")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(entity_id = %id, skipped, "vote stream lagged behind");
            None
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
