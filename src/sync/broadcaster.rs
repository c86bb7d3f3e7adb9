//! Fan-out of listing updates and value pushes to observer sessions.
//!
//! Delivery is best-effort. Two guarantees hold:
//! - a listing update reaches every registered session that accepts it
//! - for one preset, a push with version `v` is never delivered after a push
//!   with a version greater than `v`

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use super::events::{ListingUpdate, PresetRef, SessionId, SyncEvent, ValuePush};
use super::observer::{ChannelObserver, Delivery, Observer};

struct Session {
    observer: Arc<dyn Observer>,
    /// Only pushes for this preset are routed here by the fallback heuristic.
    scope: Option<PresetRef>,
    /// Activity sequence number; higher is more recent.
    last_active: u64,
}

/// What happened to a value push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered(SessionId),
    /// A newer version of this preset was already published.
    Stale { version: u64, latest: u64 },
    /// No session to address, or the addressed one did not take it.
    Undelivered,
}

/// Session registry plus the monotonic push guard.
pub struct SyncBroadcaster {
    sessions: DashMap<SessionId, Session>,
    /// Highest version published per preset. Reentrant so an observer may
    /// publish again from inside `deliver`.
    published: ReentrantMutex<RefCell<HashMap<PresetRef, u64>>>,
    activity: AtomicU64,
    next_session: AtomicU64,
}

impl Default for SyncBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncBroadcaster {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            published: ReentrantMutex::new(RefCell::new(HashMap::new())),
            activity: AtomicU64::new(0),
            next_session: AtomicU64::new(1),
        }
    }

    fn tick(&self) -> u64 {
        self.activity.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register an observer. Registration counts as activity.
    pub fn register(&self, observer: Arc<dyn Observer>, scope: Option<PresetRef>) -> SessionId {
        let id = SessionId::new(format!(
            "session-{}",
            self.next_session.fetch_add(1, Ordering::Relaxed)
        ));
        self.register_as(id.clone(), observer, scope);
        id
    }

    /// Register an observer under a caller-chosen id, replacing any previous
    /// observer with that id.
    pub fn register_as(&self, id: SessionId, observer: Arc<dyn Observer>, scope: Option<PresetRef>) {
        let last_active = self.tick();
        crate::debug_event!("broadcast", "register", "{id} scope={scope:?}");
        self.sessions.insert(
            id,
            Session {
                observer,
                scope,
                last_active,
            },
        );
    }

    /// Register a channel-backed session and hand back its receiving end.
    pub fn subscribe(&self, scope: Option<PresetRef>) -> (SessionId, mpsc::UnboundedReceiver<SyncEvent>) {
        let (observer, rx) = ChannelObserver::new();
        let id = self.register(Arc::new(observer), scope);
        (id, rx)
    }

    pub fn unregister(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Mark a session as the most recently active one. Call this when a
    /// session issues a request so unaddressed pushes find their way back.
    pub fn touch(&self, id: &SessionId) -> bool {
        let seq = self.tick();
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.last_active = seq;
                true
            }
            None => false,
        }
    }

    /// Change which preset a session is looking at.
    pub fn set_scope(&self, id: &SessionId, scope: Option<PresetRef>) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.scope = scope;
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send a listing update to every session. Returns how many took it.
    pub fn publish_listing(&self, update: ListingUpdate) -> usize {
        let event = SyncEvent::Listing(update);
        let targets: Vec<(SessionId, Arc<dyn Observer>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().observer.clone()))
            .collect();

        let mut delivered = 0;
        for (id, observer) in targets {
            match observer.deliver(&event) {
                Delivery::Delivered => delivered += 1,
                Delivery::Dropped => {}
                Delivery::Closed => self.forget(&id),
            }
        }
        crate::debug_event!("broadcast", "listing", "to {delivered} sessions");
        delivered
    }

    /// Send the full state of one preset to one session.
    ///
    /// The session is `push.target` when given; otherwise the most recently
    /// active session whose scope is unset or matches the preset.
    pub fn publish_values(&self, push: ValuePush) -> PushOutcome {
        let key = push.preset_ref();

        // Held across delivery so concurrent publishers can't interleave a
        // check with a send. The map borrow itself ends before delivery.
        let guard = self.published.lock();
        let latest = guard.borrow().get(&key).copied().unwrap_or(0);
        if push.version < latest {
            crate::debug_event!(
                "broadcast",
                "stale",
                "{} v{} < v{latest}",
                key.listing_key(),
                push.version
            );
            return PushOutcome::Stale {
                version: push.version,
                latest,
            };
        }
        guard.borrow_mut().insert(key.clone(), push.version);

        let target = match push.target.clone() {
            Some(id) => Some(id),
            None => self.best_guess(&key),
        };
        let Some(target) = target else {
            crate::debug_event!("broadcast", "dropped", "no session for {}", key.listing_key());
            return PushOutcome::Undelivered;
        };
        let Some(observer) = self.sessions.get(&target).map(|s| s.observer.clone()) else {
            crate::debug_event!("broadcast", "dropped", "unknown session {target}");
            return PushOutcome::Undelivered;
        };

        let version = push.version;
        match observer.deliver(&SyncEvent::Values(push)) {
            Delivery::Delivered => {
                crate::debug_event!(
                    "broadcast",
                    "values",
                    "{} v{version} to {target}",
                    key.listing_key()
                );
                PushOutcome::Delivered(target)
            }
            Delivery::Dropped => PushOutcome::Undelivered,
            Delivery::Closed => {
                self.forget(&target);
                PushOutcome::Undelivered
            }
        }
    }

    fn best_guess(&self, key: &PresetRef) -> Option<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| entry.scope.as_ref().is_none_or(|scope| scope == key))
            .max_by_key(|entry| entry.last_active)
            .map(|entry| entry.key().clone())
    }

    fn forget(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            crate::debug_event!("broadcast", "closed", "{id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{ValueSnapshot, ValueType};

    fn push(title: &str, version: u64) -> ValuePush {
        ValuePush {
            collection: "styles".to_string(),
            title: title.to_string(),
            exists: true,
            values: vec![ValueSnapshot {
                key: "steps".to_string(),
                value_type: ValueType::Int,
                value: version.to_string(),
            }],
            version,
            target: None,
        }
    }

    fn versions(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<u64> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::Values(p) = event {
                seen.push(p.version);
            }
        }
        seen
    }

    #[test]
    fn test_listing_reaches_every_session() {
        let broadcaster = SyncBroadcaster::new();
        let (_a, mut rx_a) = broadcaster.subscribe(None);
        let (_b, mut rx_b) = broadcaster.subscribe(Some(PresetRef::new("styles", "sunset")));

        assert_eq!(broadcaster.publish_listing(ListingUpdate::default()), 2);
        assert!(matches!(rx_a.try_recv(), Ok(SyncEvent::Listing(_))));
        assert!(matches!(rx_b.try_recv(), Ok(SyncEvent::Listing(_))));
    }

    #[test]
    fn test_push_goes_to_most_recently_active() {
        let broadcaster = SyncBroadcaster::new();
        let (a, mut rx_a) = broadcaster.subscribe(None);
        let (b, mut rx_b) = broadcaster.subscribe(None);

        assert_eq!(broadcaster.publish_values(push("sunset", 1)), PushOutcome::Delivered(b.clone()));
        broadcaster.touch(&a);
        assert_eq!(broadcaster.publish_values(push("sunset", 2)), PushOutcome::Delivered(a));

        assert_eq!(versions(&mut rx_a), vec![2]);
        assert_eq!(versions(&mut rx_b), vec![1]);
    }

    #[test]
    fn test_fallback_respects_scope() {
        let broadcaster = SyncBroadcaster::new();
        let (scoped, _rx1) = broadcaster.subscribe(Some(PresetRef::new("styles", "sunset")));
        let (other, _rx2) = broadcaster.subscribe(Some(PresetRef::new("styles", "night")));
        broadcaster.touch(&scoped);
        broadcaster.touch(&other);

        // "other" is more recent but looks at a different preset
        assert_eq!(broadcaster.publish_values(push("sunset", 1)), PushOutcome::Delivered(scoped));
    }

    #[test]
    fn test_explicit_target() {
        let broadcaster = SyncBroadcaster::new();
        let (a, mut rx_a) = broadcaster.subscribe(None);
        let (_b, mut rx_b) = broadcaster.subscribe(None);

        let outcome = broadcaster.publish_values(push("sunset", 1).with_target(Some(a.clone())));
        assert_eq!(outcome, PushOutcome::Delivered(a));
        assert_eq!(versions(&mut rx_a), vec![1]);
        assert!(versions(&mut rx_b).is_empty());

        let ghost = SessionId::new("ghost");
        let outcome = broadcaster.publish_values(push("sunset", 2).with_target(Some(ghost)));
        assert_eq!(outcome, PushOutcome::Undelivered);
    }

    #[test]
    fn test_stale_push_is_never_delivered() {
        let broadcaster = SyncBroadcaster::new();
        let (_a, mut rx) = broadcaster.subscribe(None);

        broadcaster.publish_values(push("sunset", 3));
        let outcome = broadcaster.publish_values(push("sunset", 2));
        assert_eq!(outcome, PushOutcome::Stale { version: 2, latest: 3 });
        // Same version again is an idempotent re-send
        broadcaster.publish_values(push("sunset", 3));
        // Other presets are tracked separately
        broadcaster.publish_values(push("night", 1));

        assert_eq!(versions(&mut rx), vec![3, 3, 1]);
    }

    #[test]
    fn test_closed_sessions_are_forgotten() {
        let broadcaster = SyncBroadcaster::new();
        let (_a, rx) = broadcaster.subscribe(None);
        drop(rx);

        assert_eq!(broadcaster.publish_listing(ListingUpdate::default()), 0);
        assert_eq!(broadcaster.session_count(), 0);
    }

    #[test]
    fn test_no_sessions() {
        let broadcaster = SyncBroadcaster::new();
        assert_eq!(broadcaster.publish_values(push("sunset", 1)), PushOutcome::Undelivered);
    }

    /// Forwards every push for "sunset" as a push for "dusk".
    struct Relay {
        broadcaster: std::sync::Weak<SyncBroadcaster>,
        seen: parking_lot::Mutex<Vec<(String, u64)>>,
    }

    impl Observer for Relay {
        fn deliver(&self, event: &SyncEvent) -> Delivery {
            if let SyncEvent::Values(p) = event {
                self.seen.lock().push((p.title.clone(), p.version));
                let relayed = self.broadcaster.upgrade().filter(|_| p.title == "sunset");
                if let Some(broadcaster) = relayed {
                    broadcaster.publish_values(push("dusk", p.version));
                }
            }
            Delivery::Delivered
        }
    }

    #[test]
    fn test_observer_may_publish_from_deliver() {
        let broadcaster = Arc::new(SyncBroadcaster::new());
        let relay = Arc::new(Relay {
            broadcaster: Arc::downgrade(&broadcaster),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        broadcaster.register(relay.clone(), None);

        assert!(matches!(broadcaster.publish_values(push("sunset", 2)), PushOutcome::Delivered(_)));
        assert_eq!(
            *relay.seen.lock(),
            vec![("sunset".to_string(), 2), ("dusk".to_string(), 2)]
        );
        // The guard still applies to pushes made from inside delivery
        assert!(matches!(
            broadcaster.publish_values(push("dusk", 1)),
            PushOutcome::Stale { version: 1, latest: 2 }
        ));
    }
}
