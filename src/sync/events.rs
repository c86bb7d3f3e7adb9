//! Notification payloads sent to observers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::preset::ValueSnapshot;

/// Opaque identifier of one observer session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// (collection, title) pair a version counter and a push refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetRef {
    pub collection: String,
    pub title: String,
}

impl PresetRef {
    pub fn new(collection: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            title: title.into(),
        }
    }

    /// Key used in `ListingUpdate::keys_by_preset`.
    pub fn listing_key(&self) -> String {
        format!("{}::{}", self.collection, self.title)
    }
}

/// Every collection, its preset titles, and every preset's keys, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub collections: Vec<String>,
    pub presets_by_collection: IndexMap<String, Vec<String>>,
    /// Keyed by `collection::title`.
    pub keys_by_preset: IndexMap<String, Vec<String>>,
}

/// Full state of one preset. Replaces whatever the observer held for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePush {
    pub collection: String,
    pub title: String,
    /// False when the preset was deleted; `values` is then empty.
    pub exists: bool,
    pub values: Vec<ValueSnapshot>,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<SessionId>,
}

impl ValuePush {
    pub fn preset_ref(&self) -> PresetRef {
        PresetRef::new(&self.collection, &self.title)
    }

    pub fn with_target(mut self, target: Option<SessionId>) -> Self {
        self.target = target;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Listing(ListingUpdate),
    Values(ValuePush),
}
