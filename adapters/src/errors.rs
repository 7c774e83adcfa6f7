//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while talking to the catalog,
//! the identity provider or the sponsored-listings service, providing a
//! unified error type for every collaborator call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::RequestFailed {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}
