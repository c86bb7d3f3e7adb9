//! The preset store: authoritative cache of every collection.
//!
//! # Locking
//!
//! Each collection has one write lock. Every mutation and every reload runs
//! under it, start to finish, including the disk write. Readers never take
//! it: they clone the `Arc` of the current [`CollectionState`], which a
//! writer replaces in one swap after the document is safely on disk.
//!
//! A failed write never reaches the swap, so the cache keeps the previous
//! state and no version counter moves.
//!
//! Notifications go out after the lock is released; the broadcaster's
//! monotonic guard keeps pushes for one preset in version order.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::collection::{Change, CollectionState};
use super::persistence::{self, Digest, SelfWriteLog};
use crate::config::Settings;
use crate::error::{StoreError, StoreResult};
use crate::preset::names::{self, COLLECTION_EXT};
use crate::preset::{PresetOutput, ValidationWarning, ValueSnapshot, ValueType, codec, outputs};
use crate::sync::{ListingUpdate, PresetRef, PushOutcome, SessionId, SyncBroadcaster, ValuePush};

/// Result of a successful `set_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetValueOutcome {
    pub version: u64,
    /// Set when the text did not match the type and was coerced.
    pub warning: Option<ValidationWarning>,
}

/// What a reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// Presets whose content differs from before, with their new version.
    pub changed: Vec<(String, u64)>,
    /// Titles or key sets changed, or the file appeared or vanished.
    pub listing_changed: bool,
}

impl ReloadOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty() && !self.listing_changed
    }
}

#[derive(Default)]
struct CollectionSlot {
    write_lock: Mutex<()>,
    /// `None` until first loaded.
    state: RwLock<Option<Arc<CollectionState>>>,
}

impl CollectionSlot {
    fn current(&self) -> Option<Arc<CollectionState>> {
        self.state.read().clone()
    }

    fn swap(&self, next: Arc<CollectionState>) {
        *self.state.write() = Some(next);
    }
}

/// Typed, ordered, file-backed preset store.
pub struct PresetStore {
    dir: PathBuf,
    collections: DashMap<String, Arc<CollectionSlot>>,
    self_writes: Arc<SelfWriteLog>,
    broadcaster: Option<Arc<SyncBroadcaster>>,
    quarantine_corrupt: bool,
}

impl PresetStore {
    /// Create a store over `dir`. Nothing is read until first access.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            collections: DashMap::new(),
            self_writes: Arc::new(SelfWriteLog::new()),
            broadcaster: None,
            quarantine_corrupt: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.storage.dir.clone()).with_quarantine(settings.storage.quarantine_corrupt)
    }

    /// Publish changes through this broadcaster.
    pub fn with_broadcaster(mut self, broadcaster: Arc<SyncBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Move documents that fail to parse on first load aside instead of
    /// failing.
    pub fn with_quarantine(mut self, enabled: bool) -> Self {
        self.quarantine_corrupt = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn broadcaster(&self) -> Option<&Arc<SyncBroadcaster>> {
        self.broadcaster.as_ref()
    }

    pub fn self_writes(&self) -> Arc<SelfWriteLog> {
        self.self_writes.clone()
    }

    /// Path of a collection's document. `name` must already be canonical.
    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{COLLECTION_EXT}"))
    }

    /// Collection a file in the storage directory belongs to, if any.
    pub fn collection_for_path(path: &Path) -> Option<String> {
        if path.extension()? != COLLECTION_EXT {
            return None;
        }
        let file_name = path.file_name()?.to_str()?;
        names::collection_name(file_name).ok()
    }

    fn slot(&self, name: &str) -> Arc<CollectionSlot> {
        if let Some(slot) = self.collections.get(name) {
            return slot.clone();
        }
        self.collections.entry(name.to_string()).or_default().clone()
    }

    fn state(&self, name: &str) -> StoreResult<Arc<CollectionState>> {
        let slot = self.slot(name);
        if let Some(state) = slot.current() {
            return Ok(state);
        }
        let _guard = slot.write_lock.lock();
        self.ensure_loaded(name, &slot)
    }

    /// Caller holds the slot's write lock.
    fn ensure_loaded(&self, name: &str, slot: &CollectionSlot) -> StoreResult<Arc<CollectionState>> {
        if let Some(state) = slot.current() {
            return Ok(state);
        }
        let state = Arc::new(self.first_load(name)?);
        slot.swap(state.clone());
        crate::debug_event!("store", "loaded", "{name} ({} presets)", state.presets.len());
        Ok(state)
    }

    fn first_load(&self, name: &str) -> StoreResult<CollectionState> {
        match self.read_from_disk(name) {
            Err(StoreError::CorruptDocument { path, reason }) if self.quarantine_corrupt => {
                let moved = persistence::quarantine(&path).map_err(|e| StoreError::io(&path, e))?;
                tracing::warn!(
                    "[store] {} is corrupt ({reason}); moved to {}",
                    path.display(),
                    moved.display()
                );
                Ok(CollectionState::default())
            }
            other => other,
        }
    }

    fn read_from_disk(&self, name: &str) -> StoreResult<CollectionState> {
        let path = self.collection_path(name);
        let Some(bytes) = persistence::read_document(&path).map_err(|e| StoreError::io(&path, e))?
        else {
            return Ok(CollectionState::default());
        };

        let digest = persistence::digest(&bytes);
        let text = String::from_utf8(bytes).map_err(|e| StoreError::CorruptDocument {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let presets = codec::decode(&text).map_err(|e| StoreError::CorruptDocument {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(CollectionState::loaded(presets, Some(digest)))
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Names of all persisted collections, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("[store] cannot list {}: {e}", self.dir.display());
                }
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| Self::collection_for_path(&entry.path()))
            .collect();
        names.sort();
        names
    }

    /// Preset titles of a collection in document order. A collection that
    /// was never written has no presets.
    pub fn list_presets(&self, collection: &str) -> StoreResult<Vec<String>> {
        let name = names::collection_name(collection)?;
        Ok(self.state(&name)?.titles())
    }

    /// Ordered values of one preset.
    pub fn get_preset(&self, collection: &str, title: &str) -> StoreResult<Vec<ValueSnapshot>> {
        let name = names::collection_name(collection)?;
        self.state(&name)?
            .snapshot(title)
            .ok_or_else(|| StoreError::not_found(format!("preset '{title}' in '{name}'")))
    }

    /// Current version of a preset (0 if it was never mutated).
    pub fn version(&self, collection: &str, title: &str) -> StoreResult<u64> {
        let name = names::collection_name(collection)?;
        Ok(self.state(&name)?.version(title))
    }

    /// Typed outputs of a preset; see [`outputs::resolve`].
    pub fn resolve_outputs(&self, collection: &str, title: &str) -> StoreResult<Vec<PresetOutput>> {
        let name = names::collection_name(collection)?;
        let state = self.state(&name)?;
        outputs::resolve(state.preset(title))
    }

    /// Digest of the document the cache reflects; `None` if the collection
    /// is not loaded or has no file.
    pub fn loaded_digest(&self, collection: &str) -> Option<Digest> {
        let name = names::collection_name(collection).ok()?;
        self.collections.get(&name)?.current()?.digest
    }

    /// Full listing of collections, titles and keys.
    pub fn listing(&self) -> ListingUpdate {
        let mut update = ListingUpdate::default();
        for name in self.list_collections() {
            let titles = match self.state(&name) {
                Ok(state) => {
                    for (title, preset) in &state.presets {
                        update.keys_by_preset.insert(
                            PresetRef::new(&name, title).listing_key(),
                            preset.keys().map(str::to_string).collect(),
                        );
                    }
                    state.titles()
                }
                Err(e) => {
                    tracing::warn!("[store] listing skips {name}: {e}");
                    Vec::new()
                }
            };
            update.presets_by_collection.insert(name.clone(), titles);
            update.collections.push(name);
        }
        update
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Run `edit` on a copy of the collection under its write lock, persist
    /// the copy and swap it in. An edit reporting no change skips all of that.
    fn mutate<F>(&self, collection: &str, edit: F) -> StoreResult<Arc<CollectionState>>
    where
        F: FnOnce(&mut CollectionState) -> StoreResult<Option<Change>>,
    {
        let name = names::collection_name(collection)?;
        let slot = self.slot(&name);

        let (state, change) = {
            let _guard = slot.write_lock.lock();
            let current = self.ensure_loaded(&name, &slot)?;

            let mut next = (*current).clone();
            let Some(change) = edit(&mut next)? else {
                return Ok(current);
            };
            for title in &change.touched {
                next.bump(title);
            }

            let path = self.collection_path(&name);
            let text = codec::encode(&next.presets)
                .map_err(|e| StoreError::io(&path, std::io::Error::other(e)))?;
            let digest = persistence::write_atomic(&path, text.as_bytes(), &self.self_writes)
                .map_err(|e| StoreError::io(&path, e))?;
            next.digest = Some(digest);

            let next = Arc::new(next);
            slot.swap(next.clone());
            (next, change)
        };

        crate::debug_event!("store", "committed", "{name}: {:?}", change.touched);
        self.publish(&name, &state, &change);
        Ok(state)
    }

    /// Set a value, creating the preset if needed. New keys are appended;
    /// existing keys are updated in place.
    pub fn set_value(
        &self,
        collection: &str,
        title: &str,
        key: &str,
        value_type: ValueType,
        raw: &str,
    ) -> StoreResult<SetValueOutcome> {
        names::entry_name("title", title)?;
        names::entry_name("key", key)?;

        let mut warning = None;
        let state = self.mutate(collection, |state| {
            let (change, w) = state.set_value(title, key, value_type, raw);
            warning = w;
            Ok(change)
        })?;

        if let Some(w) = &warning {
            tracing::warn!("[store] {w}");
        }
        Ok(SetValueOutcome {
            version: state.version(title),
            warning,
        })
    }

    /// Change a value's type, converting its text.
    pub fn set_type(&self, collection: &str, title: &str, key: &str, value_type: ValueType) -> StoreResult<u64> {
        let state = self.mutate(collection, |state| state.set_type(title, key, value_type))?;
        Ok(state.version(title))
    }

    /// Rename a key in place. A value already stored under `new_key` is
    /// overwritten.
    pub fn rename_key(&self, collection: &str, title: &str, old_key: &str, new_key: &str) -> StoreResult<u64> {
        names::entry_name("key", new_key)?;
        let state = self.mutate(collection, |state| state.rename_key(title, old_key, new_key))?;
        Ok(state.version(title))
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn delete_key(&self, collection: &str, title: &str, key: &str) -> StoreResult<u64> {
        let state = self.mutate(collection, |state| state.delete_key(title, key))?;
        Ok(state.version(title))
    }

    /// Reorder a preset's keys. Unknown keys are ignored; omitted keys keep
    /// their relative order after the requested ones.
    pub fn reorder<S: AsRef<str>>(&self, collection: &str, title: &str, order: &[S]) -> StoreResult<u64> {
        let state = self.mutate(collection, |state| state.reorder(title, order))?;
        Ok(state.version(title))
    }

    /// Create an empty preset. Creating an existing one is a no-op.
    pub fn create_title(&self, collection: &str, title: &str) -> StoreResult<u64> {
        names::entry_name("title", title)?;
        let state = self.mutate(collection, |state| Ok(state.create_title(title)))?;
        Ok(state.version(title))
    }

    /// Delete a preset. The collection may end up with no presets.
    pub fn delete_title(&self, collection: &str, title: &str) -> StoreResult<u64> {
        let state = self.mutate(collection, |state| state.delete_title(title))?;
        Ok(state.version(title))
    }

    /// Rename a preset, keeping its position.
    pub fn rename_title(&self, collection: &str, old_title: &str, new_title: &str) -> StoreResult<u64> {
        names::entry_name("title", new_title)?;
        let state = self.mutate(collection, |state| state.rename_title(old_title, new_title))?;
        Ok(state.version(new_title))
    }

    /// Write the starter collection when the storage directory has none.
    /// Returns whether anything was written.
    pub fn seed_default(&self) -> StoreResult<bool> {
        if !self.list_collections().is_empty() {
            return Ok(false);
        }
        self.set_value(
            "default",
            "example",
            "sample_key",
            ValueType::String,
            "Enter your value here",
        )?;
        crate::log_event!("store", "seeded", "{}", self.collection_path("default").display());
        Ok(true)
    }

    /// Re-read a collection from disk and replace the cache.
    ///
    /// Waits for any in-flight mutation of the collection. A document that
    /// fails to parse leaves the cache untouched and is reported as
    /// `CorruptDocument`. Does not publish; see [`Self::publish_reload`].
    pub fn reload(&self, collection: &str) -> StoreResult<ReloadOutcome> {
        let name = names::collection_name(collection)?;
        let slot = self.slot(&name);

        let _guard = slot.write_lock.lock();
        let loaded = slot.current();
        let fresh = self.read_from_disk(&name)?;

        if let Some(current) = &loaded {
            if current.digest == fresh.digest {
                crate::debug_event!("store", "reload", "{name} unchanged");
                return Ok(ReloadOutcome::default());
            }
        }

        let base = loaded.unwrap_or_default();
        let (next, change) = base.absorb(fresh);
        let next = Arc::new(next);
        slot.swap(next.clone());

        let outcome = ReloadOutcome {
            changed: change
                .touched
                .iter()
                .map(|title| (title.clone(), next.version(title)))
                .collect(),
            listing_changed: change.listing,
        };
        crate::log_event!(
            "store",
            "reloaded",
            "{name}: {} presets changed",
            outcome.changed.len()
        );
        Ok(outcome)
    }

    /// Publish what a reload changed: one push per changed preset and a
    /// listing update if the shape changed.
    pub fn publish_reload(&self, collection: &str, outcome: &ReloadOutcome) {
        let Ok(name) = names::collection_name(collection) else {
            return;
        };
        let Some(state) = self.collections.get(&name).and_then(|slot| slot.current()) else {
            return;
        };
        let change = Change {
            touched: outcome.changed.iter().map(|(title, _)| title.clone()).collect(),
            listing: outcome.listing_changed,
        };
        self.publish(&name, &state, &change);
    }

    /// Send the current state of a preset to `target`, or to the broadcaster's
    /// best-guess session when `target` is `None`.
    pub fn push_values(&self, collection: &str, title: &str, target: Option<SessionId>) -> StoreResult<PushOutcome> {
        let name = names::collection_name(collection)?;
        let state = self.state(&name)?;
        if state.preset(title).is_none() {
            return Err(StoreError::not_found(format!("preset '{title}' in '{name}'")));
        }
        let Some(broadcaster) = &self.broadcaster else {
            return Ok(PushOutcome::Undelivered);
        };
        let push = Self::value_push(&name, &state, title).with_target(target);
        Ok(self.publish_push(broadcaster, push))
    }

    fn value_push(name: &str, state: &CollectionState, title: &str) -> ValuePush {
        ValuePush {
            collection: name.to_string(),
            title: title.to_string(),
            exists: state.preset(title).is_some(),
            values: state.snapshot(title).unwrap_or_default(),
            version: state.version(title),
            target: None,
        }
    }

    fn publish(&self, name: &str, state: &CollectionState, change: &Change) {
        let Some(broadcaster) = &self.broadcaster else {
            return;
        };
        for title in &change.touched {
            self.publish_push(broadcaster, Self::value_push(name, state, title));
        }
        if change.listing {
            broadcaster.publish_listing(self.listing());
        }
    }

    /// Drop pushes that a later commit already superseded.
    fn publish_push(&self, broadcaster: &SyncBroadcaster, push: ValuePush) -> PushOutcome {
        let latest = self
            .collections
            .get(&push.collection)
            .and_then(|slot| slot.current())
            .map(|state| state.version(&push.title))
            .unwrap_or(0);
        if push.version < latest {
            crate::debug_event!(
                "store",
                "superseded",
                "{}::{} v{} < v{latest}",
                push.collection,
                push.title,
                push.version
            );
            return PushOutcome::Stale {
                version: push.version,
                latest,
            };
        }
        broadcaster.publish_values(push)
    }
}
