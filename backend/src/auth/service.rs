//! Core business logic for the authentication system.
//!
//! The registry maps identity-provider session tokens to the `ActionStore`
//! of that session. A store lives from sign-in until sign-out or until it has
//! been idle for longer than the configured timeout; nothing about a session
//! is global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use adapters::{CatalogAdapter, IdentityProvider};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::errors::AuthError;
use crate::errors::Result;
use crate::services::action_store::ActionStore;
use crate::services::vote_sync::VoteSync;
use crate::utils::IdPolicy;

struct Session {
    store: Arc<ActionStore>,
    last_seen: Instant,
}

pub struct SessionRegistry {
    catalog: Arc<dyn CatalogAdapter>,
    identity: Arc<dyn IdentityProvider>,
    ids: IdPolicy,
    vote_channel_capacity: usize,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(
        catalog: Arc<dyn CatalogAdapter>,
        identity: Arc<dyn IdentityProvider>,
        ids: IdPolicy,
        vote_channel_capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            identity,
            ids,
            vote_channel_capacity,
            idle_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Verifies `token` with the identity provider and opens a fresh session for it.
    pub async fn sign_in(&self, token: &str) -> Result<Arc<ActionStore>> {
        let profile = self
            .identity
            .session_user(token)
            .await?
            .ok_or(AuthError::RejectedToken)?;

        let store = Arc::new(ActionStore::new(
            self.catalog.clone(),
            self.identity.clone(),
            self.ids.clone(),
            VoteSync::new(self.vote_channel_capacity),
        ));
        store.sign_in(&profile).await;

        let previous = self.sessions.write().await.insert(
            token.to_string(),
            Session {
                store: store.clone(),
                last_seen: Instant::now(),
            },
        );
        if let Some(previous) = previous {
            previous.store.sign_out().await;
        }

        info!(user_id = %profile.id, "session opened");
        Ok(store)
    }

    /// Ends the session for `token`. Returns whether one existed.
    pub async fn sign_out(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        match removed {
            Some(session) => {
                session.store.sign_out().await;
                true
            }
            None => false,
        }
    }

    /// Looks up the session for `token` and marks it as seen. A session idle
    /// past the timeout is closed instead.
    pub async fn session(&self, token: &str) -> Option<Arc<ActionStore>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token)?;
        if session.last_seen.elapsed() < self.idle_timeout {
            session.last_seen = Instant::now();
            return Some(session.store.clone());
        }

        let expired = sessions.remove(token)?;
        drop(sessions);
        expired.store.sign_out().await;
        debug!("idle session closed on access");
        None
    }

    /// Closes every session idle past the timeout. Returns how many were closed.
    pub async fn sweep(&self) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let idle: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.last_seen.elapsed() >= self.idle_timeout)
                .map(|(token, _)| token.clone())
                .collect();
            idle.iter().filter_map(|token| sessions.remove(token)).collect()
        };

        for session in &expired {
            session.store.sign_out().await;
        }
        if !expired.is_empty() {
            info!(closed = expired.len(), "closed idle sessions");
        }
        expired.len()
    }

    /// Sweeps idle sessions every `every` until the registry is dropped.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep().await;
            }
        });
    }

    pub async fn active(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use adapters::memory::{InMemoryCatalog, InMemoryIdentity};
    use adapters::UserProfile;
    use serde_json::json;

    fn registry() -> SessionRegistry {
        let identity = InMemoryIdentity::new()
            .with_user(UserProfile::new("u1").with_metadata("saved_tools", json!(["t9"])))
            .with_session("tok", "u1");
        SessionRegistry::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(identity),
            IdPolicy::opaque(),
            8,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn sign_in_loads_state_and_sign_out_clears_it() {
        let registry = registry();

        let store = registry.sign_in("tok").await.unwrap();
        assert!(store.is_saved("t9").await);
        assert_eq!(registry.active().await, 1);

        assert!(registry.sign_out("tok").await);
        assert!(!store.is_signed_in().await);
        assert!(registry.session("tok").await.is_none());
        assert!(!registry.sign_out("tok").await);
    }

    #[tokio::test]
    async fn unknown_token_requires_auth() {
        let registry = registry();
        assert!(matches!(registry.sign_in("forged").await, Err(AppError::AuthRequired)));
        assert_eq!(registry.active().await, 0);
    }

    #[tokio::test]
    async fn signing_in_again_replaces_the_session() {
        let registry = registry();

        let first = registry.sign_in("tok").await.unwrap();
        let second = registry.sign_in("tok").await.unwrap();

        assert!(!first.is_signed_in().await);
        assert!(second.is_signed_in().await);
        assert_eq!(registry.active().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let registry = SessionRegistry {
            idle_timeout: Duration::from_millis(30),
            ..registry()
        };

        let store = registry.sign_in("tok").await.unwrap();
        assert_eq!(registry.sweep().await, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.sweep().await, 1);
        assert_eq!(registry.active().await, 0);
        assert!(!store.is_signed_in().await);
        assert!(registry.session("tok").await.is_none());
    }

    #[tokio::test]
    async fn idle_session_is_closed_on_access() {
        let registry = SessionRegistry {
            idle_timeout: Duration::from_millis(200),
            ..registry()
        };
        let store = registry.sign_in("tok").await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(registry.session("tok").await.is_some());
        tokio::time::sleep(Duration::from_millis(120)).await;
        // The first access refreshed the session.
        assert!(registry.session("tok").await.is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.session("tok").await.is_none());
        assert!(!store.is_signed_in().await);
        assert_eq!(registry.active().await, 0);
    }
}
