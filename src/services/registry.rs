//! Subscriber registry: bounded per-connection fan-out.
//!
//! DESIGN
//! ======
//! Each live stream registers a bounded `mpsc` channel. The registry owns the
//! only sender; the pump owns the receiver. Broadcast walks the map under the
//! mutex and uses `try_send`, so a full queue drops the fragment for that one
//! subscriber instead of stalling the broadcaster or its peers.
//!
//! LIFECYCLE
//! =========
//! `register` returns a `Subscription` guard. Dropping the guard unregisters
//! the subscriber, which drops the sender and closes the channel. The guard
//! unregisters at most once; `unregister` itself is idempotent.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::store::MessageId;

// =============================================================================
// TYPES
// =============================================================================

/// Pre-rendered markup for one message, shared across subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub message_id: MessageId,
    pub markup: Arc<str>,
}

impl Fragment {
    #[must_use]
    pub fn new(message_id: MessageId, markup: impl Into<Arc<str>>) -> Self {
        Self { message_id, markup: markup.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Subscriber {
    tx: mpsc::Sender<Fragment>,
    registered_at: Instant,
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct SubscriberRegistry {
    capacity: usize,
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), subscribers: Mutex::new(HashMap::new()) }
    }

    /// Per-subscriber queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a subscriber and return its guard plus the receiving end of its
    /// queue.
    pub fn register(self: &Arc<Self>) -> (Subscription, mpsc::Receiver<Fragment>) {
        let id = SubscriberId(Uuid::new_v4());
        let (tx, rx) = mpsc::channel(self.capacity);
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, Subscriber { tx, registered_at: Instant::now() });
            subscribers.len()
        };
        info!(subscriber_id = %id, subscribers = count, "chat: subscriber registered");
        (Subscription { id, registry: Some(Arc::clone(self)) }, rx)
    }

    /// Remove a subscriber and close its queue. Returns `false` if it was
    /// already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, remaining) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };
        let Some(subscriber) = removed else {
            return false;
        };
        info!(
            subscriber_id = %id,
            subscribers = remaining,
            connected_ms = subscriber.registered_at.elapsed().as_millis(),
            "chat: subscriber unregistered"
        );
        true
    }

    /// Best-effort fan-out. Returns how many subscribers accepted the fragment.
    pub fn broadcast(&self, fragment: &Fragment) -> usize {
        let subscribers = self.lock();
        let mut delivered = 0;
        for (id, subscriber) in subscribers.iter() {
            match subscriber.tx.try_send(fragment.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber_id = %id, message_id = %fragment.message_id, "chat: queue full, fragment dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = %id, "chat: receiver gone, awaiting unregister");
                }
            }
        }
        delivered
    }

    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// SUBSCRIPTION GUARD
// =============================================================================

/// Registration handle. Unregisters exactly once, on `release` or on drop.
pub struct Subscription {
    id: SubscriberId,
    registry: Option<Arc<SubscriberRegistry>>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unregister now rather than at drop.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        self.registry
            .take()
            .is_some_and(|registry| registry.unregister(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.registry.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
