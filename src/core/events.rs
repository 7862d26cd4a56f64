use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Topic names shared between the core services and host shells.
pub mod topics {
    pub const STORE_CHANGED: &str = "store.changed";
    pub const STORE_SYNCED: &str = "store.synced";
    pub const SYNC_STATUS: &str = "sync.status";
    pub const SYNC_REPLAYED: &str = "sync.replayed";
    pub const CONNECTIVITY: &str = "connectivity";
    pub const NOTIFY_DELIVERED: &str = "notify.delivered";
    pub const NOTIFY_CLOSED: &str = "notify.closed";
}

pub type SubscriptionId = u64;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// In-process pub-sub bus. Handlers run synchronously, in subscription
/// order, on the publisher's task.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: SubscriptionId,
    topics: HashMap<String, Vec<(SubscriptionId, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let mut removed = false;
        for handlers in inner.topics.values_mut() {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    pub fn publish(&self, topic: &str, payload: &Value) {
        // Handlers are invoked outside the lock so one of them may
        // subscribe or publish again without deadlocking.
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock().unwrap();
            inner
                .topics
                .get(topic)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            handler(payload);
        }
    }
}
