//! Per-path settling of bursts of file events.
//!
//! An atomic save shows up as several events (create temp, modify, rename).
//! A path is handed out once no event arrived for it for the quiet period.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    /// Path -> time of its latest event.
    pending: HashMap<PathBuf, Instant>,
    quiet: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            quiet: Duration::from_millis(debounce_ms),
        }
    }

    /// Note an event for `path`, restarting its quiet period.
    pub fn record(&mut self, path: PathBuf) {
        self.record_at(path, Instant::now());
    }

    fn record_at(&mut self, path: PathBuf, at: Instant) {
        self.pending.insert(path, at);
    }

    pub fn forget(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Remove and return every path that has been quiet long enough.
    pub fn take_settled(&mut self) -> Vec<PathBuf> {
        self.take_settled_at(Instant::now())
    }

    fn take_settled_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut settled = Vec::new();
        self.pending.retain(|path, last| {
            let quiet = now.saturating_duration_since(*last) >= self.quiet;
            if quiet {
                settled.push(path.clone());
            }
            !quiet
        });
        settled.sort();
        settled
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_burst_settles_once() {
        let mut debouncer = Debouncer::new(300);
        let start = Instant::now();
        let path = PathBuf::from("/presets/styles.toml");

        debouncer.record_at(path.clone(), start);
        debouncer.record_at(path.clone(), start + ms(100));
        debouncer.record_at(path.clone(), start + ms(200));
        assert_eq!(debouncer.pending_count(), 1);

        // 300ms after the first event but only 100ms after the last
        assert!(debouncer.take_settled_at(start + ms(300)).is_empty());
        assert_eq!(debouncer.take_settled_at(start + ms(500)), vec![path]);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_paths_settle_independently() {
        let mut debouncer = Debouncer::new(50);
        let start = Instant::now();
        let styles = PathBuf::from("/presets/styles.toml");
        let loras = PathBuf::from("/presets/loras.toml");

        debouncer.record_at(styles.clone(), start);
        debouncer.record_at(loras.clone(), start + ms(30));

        assert_eq!(debouncer.take_settled_at(start + ms(55)), vec![styles]);
        assert_eq!(debouncer.take_settled_at(start + ms(80)), vec![loras]);
    }

    #[test]
    fn test_forget() {
        let mut debouncer = Debouncer::new(50);
        let path = PathBuf::from("/presets/styles.toml");
        debouncer.record(path.clone());
        debouncer.forget(&path);
        assert!(!debouncer.has_pending());
    }
}
