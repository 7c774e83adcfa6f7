//! Custom error types specific to authentication failures.
//!
//! Every variant surfaces to callers as `AppError::AuthRequired`; the detail
//! only reaches the logs.

use thiserror::Error;

use crate::errors::AppError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingToken,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("no active session for this token")]
    UnknownSession,

    #[error("identity provider does not recognise this token")]
    RejectedToken,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(reason = %err, "authentication required");
        AppError::AuthRequired
    }
}
