//! Module for the tool API.
//!
//! This module defines the endpoints that resolve a tool page's slug and
//! apply the signed-in user's upvotes and saves to it.

pub mod handlers;
pub mod routes;
