//! Typed, ordered, file-backed presets kept in sync with their observers.
//!
//! A [`PresetStore`] owns one TOML document per collection. Mutations are
//! persisted atomically and published through a [`SyncBroadcaster`]; a
//! [`ChangeWatcher`] folds edits made outside the store back in.

pub mod config;
pub mod error;
pub mod logging;
pub mod preset;
pub mod store;
pub mod sync;
pub mod watcher;

pub use config::Settings;
pub use error::{StoreError, StoreResult};
pub use preset::{Preset, PresetOutput, PresetValue, TypedValue, ValidationWarning, ValueSnapshot, ValueType};
pub use store::{PresetStore, ReloadOutcome, SetValueOutcome};
pub use sync::{
    ChannelObserver, ListingUpdate, Observer, PresetRef, PushOutcome, SessionId, SyncBroadcaster, SyncEvent,
    ValuePush,
};
pub use watcher::{ChangeDetector, ChangeWatcher, WatchError, WatchOutcome};
