//! Observer notifications.
//!
//! Two shapes go out: listing updates (to everyone) and value pushes (to one
//! session). A push always carries the complete preset; observers replace
//! their copy instead of patching it.

mod broadcaster;
mod events;
mod observer;

pub use broadcaster::{PushOutcome, SyncBroadcaster};
pub use events::{ListingUpdate, PresetRef, SessionId, SyncEvent, ValuePush};
pub use observer::{ChannelObserver, Delivery, Observer};
