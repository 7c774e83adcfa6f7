//! Route slug to catalog entity resolution.
//!
//! A tool page may be reached through a sponsored listing's display slug or
//! through the tool's own slug. Either way every vote, save and review must
//! target the canonical catalog id, while a sponsored page keeps showing and
//! linking its sponsored slug.

use std::sync::Arc;

use adapters::{CatalogAdapter, CatalogEntity, SponsoredWrapper};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{AppError, Result};
use crate::utils::IdPolicy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntity {
    /// The catalog record, with `slug` replaced by the sponsored slug when reached through one.
    pub entity: CatalogEntity,
    /// Canonical id used for every mutation.
    pub target_id: String,
    pub sponsored_slug: Option<String>,
}

pub struct IdentityResolver {
    catalog: Arc<dyn CatalogAdapter>,
    ids: IdPolicy,
}

impl IdentityResolver {
    pub fn new(catalog: Arc<dyn CatalogAdapter>, ids: IdPolicy) -> Self {
        Self { catalog, ids }
    }

    /// Resolves `slug` against the sponsored listings first, then the catalog.
    ///
    /// `Ok(None)` means nothing is known under that slug. A sponsored listing
    /// that does not point at a real entity is an `IdentityResolution` error,
    /// never a silent fallback to a direct lookup.
    pub async fn resolve(&self, slug: &str, wrappers: &[SponsoredWrapper]) -> Result<Option<ResolvedEntity>> {
        if slug.is_empty() {
            return Ok(None);
        }

        match wrappers.iter().find(|wrapper| wrapper.slug == slug) {
            Some(wrapper) => self.resolve_sponsored(wrapper).await.map(Some),
            None => self.resolve_direct(slug).await,
        }
    }

    async fn resolve_sponsored(&self, wrapper: &SponsoredWrapper) -> Result<ResolvedEntity> {
        let reference = wrapper.entity.as_ref().ok_or_else(|| {
            warn!(slug = %wrapper.slug, "sponsored listing has no underlying tool");
            AppError::IdentityResolution(format!("'{}' has no underlying tool", wrapper.slug))
        })?;

        let id = reference.id();
        if let Err(err) = self.ids.check(id) {
            warn!(slug = %wrapper.slug, %err, "sponsored listing references an invalid id");
            return Err(AppError::IdentityResolution(format!(
                "'{}' references an invalid tool id",
                wrapper.slug
            )));
        }

        let mut entity = self.catalog.entity_by_id(id).await?.ok_or_else(|| {
            AppError::IdentityResolution(format!("'{}' references unknown tool {}", wrapper.slug, id))
        })?;

        debug!(slug = %wrapper.slug, target_id = %entity.id, canonical_slug = %entity.slug, "resolved sponsored slug");
        entity.slug = wrapper.slug.clone();

        Ok(ResolvedEntity {
            target_id: entity.id.clone(),
            entity,
            sponsored_slug: Some(wrapper.slug.clone()),
        })
    }

    async fn resolve_direct(&self, slug: &str) -> Result<Option<ResolvedEntity>> {
        let entity = match self.catalog.entity_by_slug(slug).await? {
            Some(entity) => Some(entity),
            // Only something shaped like an id is worth a second lookup.
            None if self.ids.check(slug).is_ok() => self.catalog.entity_by_id(slug).await?,
            None => None,
        };

        Ok(entity.map(|entity| ResolvedEntity {
            target_id: entity.id.clone(),
            entity,
            sponsored_slug: None,
        }))
    }
}
