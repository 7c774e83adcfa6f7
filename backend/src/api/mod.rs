//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the API domains, tool
//! pages with their vote/save actions and the caller's own action state,
//! excluding session routes which are handled by `auth`.

pub mod tools;
pub mod user;
