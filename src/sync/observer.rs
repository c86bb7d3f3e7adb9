//! The "publish to an observer" capability the broadcaster depends on.
//!
//! Transports (WebSocket handlers, the CLI's stdout printer, tests) implement
//! [`Observer`]; the store and broadcaster never see the transport itself.

use tokio::sync::mpsc;

use super::events::SyncEvent;

/// Result of handing one event to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Observer is alive but did not take the event.
    Dropped,
    /// Observer is gone; the broadcaster forgets the session.
    Closed,
}

/// A sink for sync events.
///
/// `deliver` is called from whatever thread published the change and must
/// not block. It may publish to the same broadcaster again.
pub trait Observer: Send + Sync {
    fn deliver(&self, event: &SyncEvent) -> Delivery;
}

/// Observer backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, event: &SyncEvent) -> Delivery {
        match self.tx.send(event.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Closed,
        }
    }
}
