//! Filesystem watcher over the storage directory.

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};

use super::debouncer::Debouncer;
use super::detector::{ChangeDetector, WatchOutcome};
use super::error::WatchError;
use crate::config::WatchConfig;
use crate::store::PresetStore;

/// Watches the storage directory and reloads collections edited from outside.
///
/// Events are debounced per file; settled files go through a
/// [`ChangeDetector`] on the blocking pool.
pub struct ChangeWatcher {
    dir: PathBuf,
    detector: Arc<ChangeDetector>,
    debouncer: Debouncer,
    tick: Duration,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// Kept alive for the lifetime of the loop.
    _watcher: notify::RecommendedWatcher,
}

impl ChangeWatcher {
    /// Start watching `store`'s directory, creating it if needed.
    pub fn new(store: Arc<PresetStore>, config: &WatchConfig) -> Result<Self, WatchError> {
        let dir = store.dir().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| WatchError::StorageDir {
            path: dir.clone(),
            source,
        })?;
        let dir = dir.canonicalize().map_err(|source| WatchError::StorageDir {
            path: dir.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(100);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching", "{}", dir.display());

        Ok(Self {
            dir,
            detector: Arc::new(ChangeDetector::new(store)),
            debouncer: Debouncer::new(config.debounce_ms),
            tick: Duration::from_millis(config.tick_ms.max(1)),
            event_rx: rx,
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run until the event source goes away.
    pub async fn watch(self) -> Result<(), WatchError> {
        self.watch_until(std::future::pending()).await
    }

    /// Run until `shutdown` resolves. Settled files still pending at that
    /// point are processed before returning.
    pub async fn watch_until<F>(mut self, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        crate::log_event!("watcher", "started", "{}", self.dir.display());

        // Draining runs on every tick, whatever the event traffic.
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.process_settled().await;
                    crate::log_event!("watcher", "stopped");
                    return Ok(());
                }

                res = self.event_rx.recv() => {
                    match res {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                        None => return Err(WatchError::ChannelClosed),
                    }
                }

                _ = ticker.tick() => {
                    self.process_settled().await;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        for path in event.paths {
            if PresetStore::collection_for_path(&path).is_none() {
                continue;
            }
            crate::debug_event!("watcher", "event", "{:?} {}", event.kind, path.display());
            self.debouncer.record(path);
        }
    }

    async fn process_settled(&mut self) {
        for path in self.debouncer.take_settled() {
            let detector = self.detector.clone();
            let shown = path.display().to_string();
            let outcome = tokio::task::spawn_blocking(move || detector.on_settled(&path)).await;
            match outcome {
                Ok(WatchOutcome::Reloaded(_)) | Ok(WatchOutcome::Corrupt(_)) => {}
                Ok(other) => crate::debug_event!("watcher", "settled", "{shown}: {other:?}"),
                Err(e) => tracing::error!("[watcher] reload task for {shown} failed: {e}"),
            }
        }
    }
}

