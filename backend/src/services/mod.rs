//! Module for core business logic services.
//!
//! This module encapsulates the services behind the tool pages: resolving a
//! route slug to its catalog entity, keeping a user's upvote/save state, and
//! propagating vote counts between views of the same entity.

pub mod action_store;
pub mod identity_resolver;
pub mod sponsored_cache;
pub mod vote_sync;
