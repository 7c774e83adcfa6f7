//! Data models for signed-in users: their upvoted/saved sets and the
//! request/response payloads of the session endpoints.

use std::collections::BTreeSet;

use adapters::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UPVOTED_KEY: &str = "upvoted_tools";
pub const SAVED_KEY: &str = "saved_tools";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Upvote,
    Save,
}

impl ActionKind {
    pub fn metadata_key(&self) -> &'static str {
        match self {
            ActionKind::Upvote => UPVOTED_KEY,
            ActionKind::Save => SAVED_KEY,
        }
    }
}

/// A user's upvoted and saved tool ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub upvoted: BTreeSet<String>,
    pub saved: BTreeSet<String>,
}

impl ActionState {
    /// Reads both sets from profile metadata. Absent or malformed keys load as empty.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            upvoted: read_set(metadata, UPVOTED_KEY),
            saved: read_set(metadata, SAVED_KEY),
        }
    }

    pub fn set(&self, kind: ActionKind) -> &BTreeSet<String> {
        match kind {
            ActionKind::Upvote => &self.upvoted,
            ActionKind::Save => &self.saved,
        }
    }

    pub fn set_mut(&mut self, kind: ActionKind) -> &mut BTreeSet<String> {
        match kind {
            ActionKind::Upvote => &mut self.upvoted,
            ActionKind::Save => &mut self.saved,
        }
    }

    pub fn contains(&self, kind: ActionKind, id: &str) -> bool {
        self.set(kind).contains(id)
    }
}

/// Metadata patch carrying only `kind`'s key, so the provider's merge leaves
/// every other key alone.
pub fn metadata_patch(kind: ActionKind, ids: &BTreeSet<String>) -> Metadata {
    let mut patch = Metadata::new();
    patch.insert(
        kind.metadata_key().to_string(),
        Value::Array(ids.iter().cloned().map(Value::String).collect()),
    );
    patch
}

fn read_set(metadata: &Metadata, key: &str) -> BTreeSet<String> {
    match metadata.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub actions: ActionState,
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    pub signed_in: bool,
    #[serde(flatten)]
    pub actions: ActionState,
}

#[derive(Debug, Deserialize)]
pub struct UpvoteRequest {
    #[serde(default)]
    pub current_count: u64,
}
