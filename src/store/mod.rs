//! File-backed preset store.
//!
//! One TOML document per collection under the storage directory. The store
//! owns the in-memory cache, serializes writers per collection and writes
//! documents atomically.

mod collection;
pub mod persistence;
#[allow(clippy::module_inception)]
mod store;

pub use collection::CollectionState;
pub use persistence::{Digest, SelfWriteLog};
pub use store::{PresetStore, ReloadOutcome, SetValueOutcome};
