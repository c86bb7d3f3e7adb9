//! Change watcher for edits made to collection documents outside the store.
//!
//! ```text
//! notify events -> Debouncer (per file) -> ChangeDetector
//!                                             |- own write / same digest: skip
//!                                             `- otherwise: store.reload + publish
//! ```

mod debouncer;
mod detector;
mod error;
#[allow(clippy::module_inception)]
mod watcher;

pub use debouncer::Debouncer;
pub use detector::{ChangeDetector, WatchOutcome};
pub use error::WatchError;
pub use watcher::ChangeWatcher;
