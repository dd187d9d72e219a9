//! The linked-server bridge: an external plugin publishing server entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::models::{LinkedContext, LinkedServerEntry};

/// Bridge interface version this crate understands.
pub const LINKED_BRIDGE_API_VERSION: u32 = 1;

pub type ChangeHandler = Box<dyn Fn() + Send + Sync>;

type SharedHandler = Arc<dyn Fn() + Send + Sync>;

/// Drops the registered handler when dropped or when [`Subscription::unsubscribe`] runs.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

pub trait LinkedBridge: Send + Sync {
    fn api_version(&self) -> u32;

    fn list_entries(&self) -> Vec<LinkedServerEntry>;

    fn subscribe(&self, handler: ChangeHandler) -> Subscription;
}

/// Returns the bridge only when it speaks the expected interface version.
pub fn checked_bridge(bridge: Option<Arc<dyn LinkedBridge>>) -> Option<Arc<dyn LinkedBridge>> {
    let bridge = bridge?;
    let version = bridge.api_version();
    if version != LINKED_BRIDGE_API_VERSION {
        warn!(
            version,
            expected = LINKED_BRIDGE_API_VERSION,
            "Ignoring linked-server bridge with unknown interface version"
        );
        return None;
    }
    Some(bridge)
}

/// Context for the entry with `id`, if the bridge still publishes it.
pub fn linked_context(bridge: &dyn LinkedBridge, id: &str) -> Option<LinkedContext> {
    bridge
        .list_entries()
        .iter()
        .find(|e| e.id == id)
        .map(LinkedContext::from)
}

/// In-process bridge holding a fixed set of entries. Used by the CLI and tests.
pub struct StaticBridge {
    version: u32,
    entries: Mutex<Vec<LinkedServerEntry>>,
    handlers: Arc<Mutex<HashMap<u64, SharedHandler>>>,
    next_id: AtomicU64,
}

impl StaticBridge {
    pub fn new(entries: Vec<LinkedServerEntry>) -> Self {
        Self::with_version(LINKED_BRIDGE_API_VERSION, entries)
    }

    pub fn with_version(version: u32, entries: Vec<LinkedServerEntry>) -> Self {
        Self {
            version,
            entries: Mutex::new(entries),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Replaces the published entries and notifies subscribers.
    ///
    /// Handlers run without any lock held, so they may subscribe, unsubscribe
    /// or read the entries.
    pub fn set_entries(&self, entries: Vec<LinkedServerEntry>) {
        *self.entries.lock() = entries;
        let handlers: Vec<SharedHandler> = self.handlers.lock().values().cloned().collect();
        debug!(subscribers = handlers.len(), "Linked entries changed");
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl LinkedBridge for StaticBridge {
    fn api_version(&self) -> u32 {
        self.version
    }

    fn list_entries(&self) -> Vec<LinkedServerEntry> {
        self.entries.lock().clone()
    }

    fn subscribe(&self, handler: ChangeHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, Arc::from(handler));
        let handlers = Arc::clone(&self.handlers);
        Subscription::new(move || {
            handlers.lock().remove(&id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn entry(id: &str) -> LinkedServerEntry {
        LinkedServerEntry {
            id: id.into(),
            name: id.into(),
            host: "nas".into(),
            port: 9000,
            https: false,
            auth_token: String::new(),
            enable_whitelist: false,
            whitelist_files: Vec::new(),
        }
    }

    #[test]
    fn test_version_gate() {
        let good: Arc<dyn LinkedBridge> = Arc::new(StaticBridge::new(vec![]));
        let bad: Arc<dyn LinkedBridge> = Arc::new(StaticBridge::with_version(99, vec![]));
        assert!(checked_bridge(Some(good)).is_some());
        assert!(checked_bridge(Some(bad)).is_none());
        assert!(checked_bridge(None).is_none());
    }

    #[test]
    fn test_linked_context_lookup() {
        let bridge = StaticBridge::new(vec![entry("a"), entry("b")]);
        let ctx = linked_context(&bridge, "b").unwrap();
        assert_eq!(ctx.base_url, "http://nas:9000");
        assert!(linked_context(&bridge, "zzz").is_none());
    }

    #[test]
    fn test_subscription_notifies_until_dropped() {
        let bridge = StaticBridge::new(vec![]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = bridge.subscribe(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.set_entries(vec![entry("a")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        assert_eq!(bridge.subscriber_count(), 0);
        bridge.set_entries(vec![]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_touch_the_bridge() {
        let bridge = Arc::new(StaticBridge::new(vec![]));
        let seen = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&bridge);
        let counter = Arc::clone(&seen);
        let own = Arc::clone(&slot);
        let sub = bridge.subscribe(Box::new(move || {
            if let Some(bridge) = weak.upgrade() {
                counter.store(bridge.list_entries().len(), Ordering::SeqCst);
                drop(bridge.subscribe(Box::new(|| {})));
            }
            // One-shot: drop our own subscription from inside the callback.
            drop(own.lock().take());
        }));
        *slot.lock() = Some(sub);

        bridge.set_entries(vec![entry("a"), entry("b")]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.subscriber_count(), 0);
    }
}
