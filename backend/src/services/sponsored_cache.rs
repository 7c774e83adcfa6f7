//! Time-bounded cache over the sponsored-listings collaborator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adapters::{SponsoredListings, SponsoredWrapper};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::Result;

struct Cached {
    loaded_at: Instant,
    listings: Arc<Vec<SponsoredWrapper>>,
}

pub struct SponsoredCache {
    source: Arc<dyn SponsoredListings>,
    ttl: Duration,
    cached: RwLock<Option<Cached>>,
}

impl SponsoredCache {
    pub fn new(source: Arc<dyn SponsoredListings>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Current listings. Stale data is served when a refresh fails; an error
    /// is returned only if nothing was ever loaded.
    pub async fn listings(&self) -> Result<Arc<Vec<SponsoredWrapper>>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.listings.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(current) = cached.as_ref() {
            if current.loaded_at.elapsed() < self.ttl {
                return Ok(current.listings.clone());
            }
        }

        match self.source.listings().await {
            Ok(listings) => {
                debug!(count = listings.len(), "refreshed sponsored listings");
                let listings = Arc::new(listings);
                *cached = Some(Cached {
                    loaded_at: Instant::now(),
                    listings: listings.clone(),
                });
                Ok(listings)
            }
            Err(err) => match cached.as_ref() {
                Some(stale) => {
                    warn!(%err, "sponsored listings refresh failed, serving stale copy");
                    Ok(stale.listings.clone())
                }
                None => Err(err.into()),
            },
        }
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
