//! ToolHub action service.
//!
//! Backend for the vote, save and sponsored-slug behaviour of the AI tools
//! directory. The catalog, the identity provider and the sponsored listings
//! are external collaborators reached through the `adapters` crate; this
//! crate owns what happens between them:
//!
//! - resolving a page slug (sponsored or not) to the catalog id every
//!   mutation must target,
//! - keeping each session's upvoted/saved sets, applied optimistically and
//!   rolled back from the profile when the catalog or the profile write fails,
//! - broadcasting confirmed vote counts to every view of the entity in the
//!   same session.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod services;
pub mod state;
pub mod utils;

use config::Config;
use errors::{AppError, Result};
use state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Builds the full router over `state`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api/auth", auth::routes::auth_router())
        .nest("/api/tools", api::tools::routes::tools_router())
        .nest("/api/user", api::user::user_router())
        .layer(middleware::trace_layer())
        .layer(middleware::cors_layer())
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toolhub=info,adapters=info,tower_http=info")))
        .with(fmt::layer())
        .init();

    info!("Loading configuration...");
    let config = Config::load()?;
    let state = AppState::new(config)?;
    state
        .sessions
        .start_sweeper(state.config.session_idle.min(SESSION_SWEEP_INTERVAL));

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::Internal(format!("Cannot bind {address}: {e}")))?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {e}")))?;

    info!("Server shut down");
    Ok(())
}

async fn root_handler() -> &'static str {
    "Welcome to ToolHub!"
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
