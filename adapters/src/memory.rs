//! In-memory adapter implementations.
//!
//! This file contains complete in-process implementations of the collaborator
//! traits, used for local runs and by the test suites. Each keeps call
//! counters and exposes switches for injecting failures, so callers can assert
//! which collaborator calls happened and how failures were handled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{Mutex, RwLock};

use crate::errors::{AdapterError, Result};
use crate::models::{CatalogEntity, Metadata, SponsoredWrapper, UserProfile, VoteAction, VoteResponse};
use crate::{CatalogAdapter, IdentityProvider, SponsoredListings};

#[derive(Default)]
pub struct InMemoryCatalog {
    entities: RwLock<HashMap<String, CatalogEntity>>,
    vote_log: Mutex<Vec<(String, VoteAction)>>,
    scripted_responses: Mutex<Vec<VoteResponse>>,
    vote_delay: Option<Duration>,
    fail_votes: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: CatalogEntity) -> Self {
        self.entities.get_mut().insert(entity.id.clone(), entity);
        self
    }

    /// Holds every vote call for `delay` before answering.
    pub fn with_vote_delay(mut self, delay: Duration) -> Self {
        self.vote_delay = Some(delay);
        self
    }

    pub fn fail_votes(&self, fail: bool) {
        self.fail_votes.store(fail, Ordering::SeqCst);
    }

    /// Queues a canned answer for the next vote call, bypassing the tally.
    pub async fn script_vote_response(&self, response: VoteResponse) {
        self.scripted_responses.lock().await.push(response);
    }

    pub async fn vote_log(&self) -> Vec<(String, VoteAction)> {
        self.vote_log.lock().await.clone()
    }

    pub async fn vote_calls(&self) -> usize {
        self.vote_log.lock().await.len()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub async fn votes_of(&self, id: &str) -> Option<u64> {
        self.entities.read().await.get(id).map(|entity| entity.votes)
    }
}

#[async_trait]
impl CatalogAdapter for InMemoryCatalog {
    async fn entity_by_slug(&self, slug: &str) -> Result<Option<CatalogEntity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let entities = self.entities.read().await;
        Ok(entities.values().find(|entity| entity.slug == slug).cloned())
    }

    async fn entity_by_id(&self, id: &str) -> Result<Option<CatalogEntity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn vote(&self, id: &str, action: VoteAction) -> Result<VoteResponse> {
        self.vote_log.lock().await.push((id.to_string(), action));

        if let Some(delay) = self.vote_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_votes.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("catalog vote endpoint disabled".to_string()));
        }

        {
            let mut scripted = self.scripted_responses.lock().await;
            if !scripted.is_empty() {
                return Ok(scripted.remove(0));
            }
        }

        let mut entities = self.entities.write().await;
        let Some(entity) = entities.get_mut(id) else {
            debug!("vote for unknown entity {id}");
            return Ok(VoteResponse {
                success: false,
                votes: serde_json::Value::Null,
            });
        };

        entity.votes = match action {
            VoteAction::Upvote => entity.votes + 1,
            VoteAction::Downvote => entity.votes.saturating_sub(1),
        };
        debug!("{} on {id}, tally now {}", action.as_str(), entity.votes);

        Ok(VoteResponse::accepted(entity.votes))
    }
}

#[derive(Default)]
pub struct InMemoryIdentity {
    users: RwLock<HashMap<String, UserProfile>>,
    sessions: RwLock<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    updates: AtomicUsize,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, profile: UserProfile) -> Self {
        self.users.get_mut().insert(profile.id.clone(), profile);
        self
    }

    pub fn with_session(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.sessions.get_mut().insert(token.into(), user_id.into());
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub async fn metadata_of(&self, user_id: &str) -> Option<Metadata> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|profile| profile.metadata.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn session_user(&self, token: &str) -> Result<Option<UserProfile>> {
        let user_id = match self.sessions.read().await.get(token) {
            Some(user_id) => user_id.clone(),
            None => return Ok(None),
        };
        self.user(&user_id).await
    }

    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("identity reads disabled".to_string()));
        }
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, patch: Metadata) -> Result<UserProfile> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("identity updates disabled".to_string()));
        }

        let mut users = self.users.write().await;
        let profile = users
            .get_mut(user_id)
            .ok_or_else(|| AdapterError::UnknownUser(user_id.to_string()))?;
        for (key, value) in patch {
            profile.metadata.insert(key, value);
        }
        Ok(profile.clone())
    }
}

#[derive(Default)]
pub struct StaticSponsored {
    listings: RwLock<Vec<SponsoredWrapper>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl StaticSponsored {
    pub fn new(listings: Vec<SponsoredWrapper>) -> Self {
        Self {
            listings: RwLock::new(listings),
            ..Default::default()
        }
    }

    pub async fn replace(&self, listings: Vec<SponsoredWrapper>) {
        *self.listings.write().await = listings;
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SponsoredListings for StaticSponsored {
    async fn listings(&self) -> Result<Vec<SponsoredWrapper>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("sponsored listings disabled".to_string()));
        }
        Ok(self.listings.read().await.clone())
    }
}
