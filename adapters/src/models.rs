//! Generic data models for the `adapters` crate.
//!
//! These models define the shapes exchanged with the catalog store, the
//! identity provider and the sponsored-listings service, so the backend
//! services work against one consistent format whichever adapter is in use.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form profile metadata kept by the identity provider.
pub type Metadata = serde_json::Map<String, Value>;

/// Canonical catalog record for a listed tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntity {
    #[serde(alias = "_id")]
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub rating: f32,
}

impl CatalogEntity {
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: String::new(),
            votes: 0,
            views: 0,
            rating: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_votes(mut self, votes: u64) -> Self {
        self.votes = votes;
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = rating.clamp(0.0, 5.0);
        self
    }
}

/// Reference from a sponsored listing to the entity it promotes.
///
/// The sponsored-listings service either embeds the whole entity or only
/// sends its id; on the wire that is an object or a bare string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EntityRef {
    Unresolved(String),
    Resolved(CatalogEntity),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Unresolved(id) => id,
            EntityRef::Resolved(entity) => &entity.id,
        }
    }
}

/// Promotional projection of a catalog entity under its own display slug.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SponsoredWrapper {
    pub slug: String,
    #[serde(default, alias = "tool")]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SponsoredWrapper {
    pub fn new(slug: impl Into<String>, entity: Option<EntityRef>) -> Self {
        Self {
            slug: slug.into(),
            entity,
            name: None,
            logo: None,
            description: None,
        }
    }
}

/// Decodes a sponsored-listings payload one record at a time.
///
/// A record whose tool reference does not decode is kept with only the id it
/// carries (or no reference at all), so it resolves to an error on its own
/// page instead of failing the whole list. Records without a slug are dropped.
pub fn decode_listings(records: Vec<Value>) -> Vec<SponsoredWrapper> {
    records.into_iter().filter_map(decode_listing).collect()
}

fn decode_listing(record: Value) -> Option<SponsoredWrapper> {
    let err = match SponsoredWrapper::deserialize(&record) {
        Ok(wrapper) => return Some(wrapper),
        Err(err) => err,
    };

    let Some(slug) = record.get("slug").and_then(Value::as_str) else {
        warn!("Skipping sponsored listing without a slug: {err}");
        return None;
    };
    warn!("Sponsored listing {slug} is malformed ({err}), keeping its tool id only");

    let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string);
    let reference = record.get("tool").or_else(|| record.get("entity"));
    let id = match reference {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Object(fields)) => fields
            .get("_id")
            .or_else(|| fields.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    Some(SponsoredWrapper {
        slug: slug.to_string(),
        entity: id.map(EntityRef::Unresolved),
        name: text("name"),
        logo: text("logo"),
        description: text("description"),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Upvote,
    Downvote,
}

impl VoteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteAction::Upvote => "upvote",
            VoteAction::Downvote => "downvote",
        }
    }
}

/// Raw answer of the catalog vote endpoint.
///
/// `votes` is kept untyped so callers can tell a missing or non-numeric
/// count apart from a real one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub votes: Value,
}

impl VoteResponse {
    pub fn accepted(votes: u64) -> Self {
        Self {
            success: true,
            votes: Value::from(votes),
        }
    }

    /// The authoritative count, if the response carries a usable one.
    pub fn count(&self) -> Option<u64> {
        self.votes.as_u64()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
