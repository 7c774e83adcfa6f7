//! Shared application state handed to every handler.

use std::sync::Arc;

use adapters::rest::{RestCatalog, RestIdentity, RestSponsored};
use adapters::{CatalogAdapter, IdentityProvider, SponsoredListings};

use crate::auth::service::SessionRegistry;
use crate::config::Config;
use crate::errors::Result;
use crate::services::identity_resolver::IdentityResolver;
use crate::services::sponsored_cache::SponsoredCache;

pub struct AppState {
    pub config: Config,
    pub resolver: IdentityResolver,
    pub sponsored: SponsoredCache,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Wires the REST adapters named by `config`.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let catalog = Arc::new(RestCatalog::new(&config.catalog_url, config.http_timeout)?);
        let identity = Arc::new(RestIdentity::new(
            &config.identity_url,
            config.identity_secret.clone(),
            config.http_timeout,
        )?);
        let sponsored = Arc::new(RestSponsored::new(&config.catalog_url, config.http_timeout)?);

        Ok(Self::with_adapters(config, catalog, identity, sponsored))
    }

    pub fn with_adapters(
        config: Config,
        catalog: Arc<dyn CatalogAdapter>,
        identity: Arc<dyn IdentityProvider>,
        sponsored: Arc<dyn SponsoredListings>,
    ) -> Arc<Self> {
        Arc::new(Self {
            resolver: IdentityResolver::new(catalog.clone(), config.id_policy.clone()),
            sponsored: SponsoredCache::new(sponsored, config.sponsored_ttl),
            sessions: Arc::new(SessionRegistry::new(
                catalog,
                identity,
                config.id_policy.clone(),
                config.vote_channel_capacity,
                config.session_idle,
            )),
            config,
        })
    }
}
