//! Core `adapters` crate for abstracting the collaborators of the ToolHub
//! action core.
//!
//! This crate defines the traits the backend talks through (`CatalogAdapter`,
//! `IdentityProvider`, `SponsoredListings`) and provides a central point for
//! accessing concrete implementations: REST clients for the deployed services
//! and in-memory stores for local runs and tests.

use async_trait::async_trait;

pub mod errors;
pub mod memory;
pub mod models;
pub mod rest;

pub use errors::{AdapterError, Result};
pub use models::*;

/// Catalog backing store: entity lookups and server-side vote counting.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    async fn entity_by_slug(&self, slug: &str) -> Result<Option<CatalogEntity>>;

    async fn entity_by_id(&self, id: &str) -> Result<Option<CatalogEntity>>;

    /// Applies a vote and returns the store's answer, including the new count.
    async fn vote(&self, id: &str, action: VoteAction) -> Result<VoteResponse>;
}

/// Third-party identity/session provider holding the user's profile metadata.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a session token to the signed-in user, `None` if the token is unknown.
    async fn session_user(&self, token: &str) -> Result<Option<UserProfile>>;

    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Merges the top-level keys of `patch` into the stored metadata.
    async fn update_profile(&self, user_id: &str, patch: Metadata) -> Result<UserProfile>;
}

/// Source of the sponsored listings shown alongside the catalog.
#[async_trait]
pub trait SponsoredListings: Send + Sync {
    async fn listings(&self) -> Result<Vec<SponsoredWrapper>>;
}
