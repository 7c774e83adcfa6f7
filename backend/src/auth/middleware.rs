//! Extractors for authenticated routes.
//!
//! Session tokens travel as `Authorization: Bearer <token>`. `BearerToken`
//! only reads the header; `CurrentSession` also requires an open session in
//! the registry. Wrap either in `Option` for routes that also serve
//! signed-out callers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::auth::errors::AuthError;
use crate::errors::AppError;
use crate::services::action_store::ActionStore;
use crate::state::AppState;

pub struct BearerToken(pub String);

pub struct CurrentSession {
    pub token: String,
    pub store: Arc<ActionStore>,
}

pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MalformedHeader)?;

    Ok(token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_token(&parts.headers)?))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let store = state
            .sessions
            .session(&token)
            .await
            .ok_or(AuthError::UnknownSession)?;

        Ok(Self { token, store })
    }
}
