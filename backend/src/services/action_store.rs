//! Per-session upvote and save state.
//!
//! The store owns a signed-in user's upvoted/saved sets. Toggles are applied
//! optimistically, confirmed against the catalog (votes) and persisted into
//! the identity provider's profile metadata. Any failure drops the optimistic
//! change and reloads the sets from the profile, which stays the source of
//! truth.
//!
//! Each toggle moves its entity through `Idle -> Pending -> Committed |
//! RolledBack`. Toggles on one id are serialized by a per-id lock; toggles on
//! different ids run concurrently and only serialize around the profile write.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adapters::{CatalogAdapter, IdentityProvider, UserProfile, VoteAction};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::auth::models::{metadata_patch, ActionKind, ActionState};
use crate::errors::{AppError, Result};
use crate::services::vote_sync::{VoteEvent, VoteSync};
use crate::utils::IdPolicy;

/// Finished phases kept per session; past this, ids not in flight read as `Idle` again.
const PHASE_HISTORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TogglePhase {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub entity_id: String,
    pub votes: u64,
    pub upvoted: bool,
    pub previous_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub entity_id: String,
    pub saved: bool,
}

struct SignedIn {
    user_id: String,
    epoch: u64,
    /// Membership confirmed by the profile.
    committed: ActionState,
    /// Optimistic flips of toggles still in flight.
    pending: HashMap<String, ActionKind>,
}

impl SignedIn {
    fn effective(&self, kind: ActionKind, id: &str) -> bool {
        let flipped = self.pending.get(id) == Some(&kind);
        self.committed.contains(kind, id) != flipped
    }
}

/// Hands out one async mutex per key; idle entries are pruned on the next acquire.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct ActionStore {
    catalog: Arc<dyn CatalogAdapter>,
    identity: Arc<dyn IdentityProvider>,
    ids: IdPolicy,
    sync: VoteSync,
    session: RwLock<Option<SignedIn>>,
    epochs: AtomicU64,
    locks: KeyedLocks,
    profile_write: Mutex<()>,
    phases: Mutex<HashMap<String, TogglePhase>>,
}

impl ActionStore {
    pub fn new(
        catalog: Arc<dyn CatalogAdapter>,
        identity: Arc<dyn IdentityProvider>,
        ids: IdPolicy,
        sync: VoteSync,
    ) -> Self {
        Self {
            catalog,
            identity,
            ids,
            sync,
            session: RwLock::new(None),
            epochs: AtomicU64::new(0),
            locks: KeyedLocks::default(),
            profile_write: Mutex::new(()),
            phases: Mutex::new(HashMap::new()),
        }
    }

    pub fn vote_sync(&self) -> &VoteSync {
        &self.sync
    }

    /// Starts a session for `profile`, loading both sets from its metadata.
    pub async fn sign_in(&self, profile: &UserProfile) {
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let committed = ActionState::from_metadata(&profile.metadata);
        info!(
            user_id = %profile.id,
            upvoted = committed.upvoted.len(),
            saved = committed.saved.len(),
            "action state loaded"
        );

        *self.session.write().await = Some(SignedIn {
            user_id: profile.id.clone(),
            epoch,
            committed,
            pending: HashMap::new(),
        });
        self.phases.lock().await.clear();
    }

    /// Forgets the in-memory sets. The profile is left untouched.
    pub async fn sign_out(&self) {
        self.epochs.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.session.write().await.take() {
            info!(user_id = %previous.user_id, "action state cleared");
        }
        self.phases.lock().await.clear();
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.user_id.clone())
    }

    pub async fn is_upvoted(&self, id: &str) -> bool {
        self.is_member(ActionKind::Upvote, id).await
    }

    pub async fn is_saved(&self, id: &str) -> bool {
        self.is_member(ActionKind::Save, id).await
    }

    /// The sets as currently displayed, optimistic flips included.
    pub async fn snapshot(&self) -> ActionState {
        let session = self.session.read().await;
        let Some(session) = session.as_ref() else {
            return ActionState::default();
        };

        let mut state = session.committed.clone();
        for (id, kind) in &session.pending {
            let set = state.set_mut(*kind);
            if !set.remove(id) {
                set.insert(id.clone());
            }
        }
        state
    }

    pub async fn phase(&self, id: &str) -> TogglePhase {
        self.phases
            .lock()
            .await
            .get(id)
            .copied()
            .unwrap_or(TogglePhase::Idle)
    }

    /// Flips the user's upvote on `id` and returns the catalog's new count.
    pub async fn toggle_upvote(&self, id: &str, current_count: u64) -> Result<VoteOutcome> {
        let (user_id, epoch, was_upvoted, _guard) = self.begin(ActionKind::Upvote, id).await?;
        let action = if was_upvoted {
            VoteAction::Downvote
        } else {
            VoteAction::Upvote
        };
        debug!(entity_id = %id, action = action.as_str(), current_count, "toggling upvote");

        let confirmed = match self.catalog.vote(id, action).await {
            Ok(response) if response.success => response
                .count()
                .ok_or_else(|| format!("vote response carried no usable count ({})", response.votes)),
            Ok(_) => Err("catalog rejected the vote".to_string()),
            Err(err) => Err(err.to_string()),
        };

        let votes = match confirmed {
            Ok(votes) => votes,
            Err(reason) => {
                warn!(entity_id = %id, %reason, "vote failed, reloading action state");
                self.roll_back(&user_id, epoch, id).await;
                return Err(AppError::VoteSync(reason));
            }
        };

        if votes.abs_diff(current_count) > 1 {
            debug!(entity_id = %id, current_count, votes, "displayed count had drifted");
        }

        let upvoted = !was_upvoted;
        if let Err(err) = self.commit(ActionKind::Upvote, &user_id, epoch, id, upvoted).await {
            warn!(entity_id = %id, %err, "vote counted but not persisted, reloading action state");
            self.roll_back(&user_id, epoch, id).await;
            // The count is the catalog's truth either way.
            self.sync.publish(VoteEvent {
                entity_id: id.to_string(),
                new_count: votes,
                upvoted: self.is_upvoted(id).await,
            });
            return Err(AppError::VoteSync(format!("profile update failed: {err}")));
        }

        self.sync.publish(VoteEvent {
            entity_id: id.to_string(),
            new_count: votes,
            upvoted,
        });
        info!(entity_id = %id, votes, upvoted, "vote committed");

        Ok(VoteOutcome {
            entity_id: id.to_string(),
            votes,
            upvoted,
            previous_count: current_count,
        })
    }

    /// Flips whether `id` is in the user's saved set.
    pub async fn toggle_save(&self, id: &str) -> Result<SaveOutcome> {
        let (user_id, epoch, was_saved, _guard) = self.begin(ActionKind::Save, id).await?;
        let saved = !was_saved;

        if let Err(err) = self.commit(ActionKind::Save, &user_id, epoch, id, saved).await {
            warn!(entity_id = %id, %err, "save not persisted, reloading action state");
            self.roll_back(&user_id, epoch, id).await;
            return Err(AppError::ProfileSync(err.to_string()));
        }

        info!(entity_id = %id, saved, "save committed");
        Ok(SaveOutcome {
            entity_id: id.to_string(),
            saved,
        })
    }

    /// Replaces both sets with the ones stored in the profile.
    pub async fn reload(&self) -> Result<()> {
        let Some((user_id, epoch)) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| (s.user_id.clone(), s.epoch))
        else {
            return Err(AppError::AuthRequired);
        };
        self.reload_committed(&user_id, epoch).await
    }

    async fn is_member(&self, kind: ActionKind, id: &str) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|session| session.effective(kind, id))
    }

    /// Checks preconditions, takes the id's lock and records the optimistic flip.
    async fn begin(&self, kind: ActionKind, id: &str) -> Result<(String, u64, bool, OwnedMutexGuard<()>)> {
        if !self.is_signed_in().await {
            return Err(AppError::AuthRequired);
        }
        self.ids.check(id)?;

        let guard = self.locks.acquire(id).await;

        let (user_id, epoch, was_member) = {
            let mut session = self.session.write().await;
            // The session may have ended while we waited for the lock.
            let session = session.as_mut().ok_or(AppError::AuthRequired)?;
            let was_member = session.committed.contains(kind, id);
            session.pending.insert(id.to_string(), kind);
            (session.user_id.clone(), session.epoch, was_member)
        };
        self.set_phase(id, TogglePhase::Pending).await;

        Ok((user_id, epoch, was_member, guard))
    }

    /// Persists the flip and folds it into the committed sets.
    ///
    /// The flip is applied to the set the profile holds right now, not to this
    /// session's copy, so other sessions of the same user keep their changes.
    async fn commit(&self, kind: ActionKind, user_id: &str, epoch: u64, id: &str, member: bool) -> Result<()> {
        let _write = self.profile_write.lock().await;

        let mut ids = self.stored_set(kind, user_id).await?;
        if member {
            ids.insert(id.to_string());
        } else {
            ids.remove(id);
        }

        self.identity
            .update_profile(user_id, metadata_patch(kind, &ids))
            .await?;

        // A session that ended mid-flight keeps its empty state.
        if let Some(session) = self.session.write().await.as_mut().filter(|s| s.epoch == epoch) {
            *session.committed.set_mut(kind) = ids;
            session.pending.remove(id);
        }
        self.set_phase(id, TogglePhase::Committed).await;
        Ok(())
    }

    async fn roll_back(&self, user_id: &str, epoch: u64, id: &str) {
        if let Some(session) = self.session.write().await.as_mut().filter(|s| s.epoch == epoch) {
            session.pending.remove(id);
        }
        if let Err(err) = self.reload_committed(user_id, epoch).await {
            // Dropping the pending flip already restored the pre-toggle membership.
            warn!(user_id, %err, "could not reload action state from profile");
        }
        self.set_phase(id, TogglePhase::RolledBack).await;
    }

    async fn reload_committed(&self, user_id: &str, epoch: u64) -> Result<()> {
        let _write = self.profile_write.lock().await;
        let profile = self
            .identity
            .user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;

        if let Some(session) = self.session.write().await.as_mut().filter(|s| s.epoch == epoch) {
            session.committed = ActionState::from_metadata(&profile.metadata);
            debug!(user_id, "action state reloaded");
        }
        Ok(())
    }

    async fn stored_set(&self, kind: ActionKind, user_id: &str) -> Result<BTreeSet<String>> {
        let profile = self
            .identity
            .user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        Ok(ActionState::from_metadata(&profile.metadata).set(kind).clone())
    }

    async fn set_phase(&self, id: &str, phase: TogglePhase) {
        let mut phases = self.phases.lock().await;
        phases.insert(id.to_string(), phase);
        if phases.len() > PHASE_HISTORY {
            phases.retain(|key, phase| *phase == TogglePhase::Pending || key == id);
        }
    }
}
