//! Global application error types and handlers.
//!
//! This module defines the error taxonomy shared by the resolver, the action
//! store and the HTTP layer, and maps every kind onto a consistent JSON
//! response.

use adapters::AdapterError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Sign in to continue")]
    AuthRequired,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Sponsored data incomplete: {0}")]
    IdentityResolution(String),

    #[error("Vote could not be synchronised: {0}")]
    VoteSync(String),

    #[error("Saved tools could not be synchronised: {0}")]
    ProfileSync(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Collaborator error: {0}")]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthRequired => "auth_required",
            AppError::InvalidTarget(_) => "invalid_target",
            AppError::IdentityResolution(_) => "identity_resolution",
            AppError::VoteSync(_) => "vote_sync",
            AppError::ProfileSync(_) => "profile_sync",
            AppError::NotFound(_) => "not_found",
            AppError::Adapter(_) => "upstream",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            AppError::IdentityResolution(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::VoteSync(_) | AppError::ProfileSync(_) | AppError::Adapter(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), "{}", self);
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
