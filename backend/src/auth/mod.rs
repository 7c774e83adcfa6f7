//! Authentication module for managing sessions and the per-user action state.
//!
//! This module provides the public interface for session handling: the
//! registry of open sessions, bearer-token extractors, the user action
//! models and the sign-in/sign-out routes.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;

// Re-exports for convenience
pub use errors::*;
pub use middleware::*;
pub use models::*;
pub use routes::*;
pub use service::*;
