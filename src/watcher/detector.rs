//! Decides what a settled file event means for the store.

use std::path::Path;
use std::sync::Arc;

use crate::store::persistence;
use crate::store::{PresetStore, ReloadOutcome, SelfWriteLog};

/// What the detector did with a settled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Not a collection document.
    Ignored,
    /// The file holds exactly what the store last wrote.
    SelfWrite,
    /// The cache already reflects the file's content.
    Unchanged,
    /// External edit absorbed and published.
    Reloaded(ReloadOutcome),
    /// The file does not parse; the cache kept its last good state.
    Corrupt(String),
    /// The file could not be read.
    Unreadable(String),
}

/// Turns settled paths into reloads, skipping the store's own writes.
pub struct ChangeDetector {
    store: Arc<PresetStore>,
    self_writes: Arc<SelfWriteLog>,
}

impl ChangeDetector {
    pub fn new(store: Arc<PresetStore>) -> Self {
        let self_writes = store.self_writes();
        Self { store, self_writes }
    }

    /// Handle a path whose events have settled.
    ///
    /// A file whose digest matches the cache is left alone. Anything else
    /// goes through a reload, which waits for an in-flight mutation of the
    /// same collection and re-checks the digest under its lock.
    pub fn on_settled(&self, path: &Path) -> WatchOutcome {
        let Some(name) = PresetStore::collection_for_path(path) else {
            return WatchOutcome::Ignored;
        };
        let document = self.store.collection_path(&name);

        match persistence::read_document(&document) {
            Ok(Some(bytes)) => {
                let digest = persistence::digest(&bytes);
                if self.store.loaded_digest(&name) == Some(digest) {
                    if self.self_writes.is_self_write(&document, &digest) {
                        crate::debug_event!("watcher", "self-write", "{}", document.display());
                        return WatchOutcome::SelfWrite;
                    }
                    return WatchOutcome::Unchanged;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("[watcher] cannot read {}: {e}", document.display());
                return WatchOutcome::Unreadable(e.to_string());
            }
        }

        match self.store.reload(&name) {
            Ok(outcome) if outcome.is_unchanged() => WatchOutcome::Unchanged,
            Ok(outcome) => {
                crate::log_event!(
                    "watcher",
                    "external edit",
                    "{name}: {} presets changed",
                    outcome.changed.len()
                );
                self.store.publish_reload(&name, &outcome);
                WatchOutcome::Reloaded(outcome)
            }
            Err(e) => {
                tracing::warn!("[watcher] keeping last good state of {name}: {e}");
                WatchOutcome::Corrupt(e.to_string())
            }
        }
    }
}
