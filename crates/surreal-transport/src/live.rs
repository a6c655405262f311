//! Live-subscription registry: subscription id → notification callback.
//!
//! Each subscription gets its own unbounded queue and a task draining it, so
//! the reader loop never waits on a callback. Notifications for one
//! subscription are delivered in the order they were read off the wire; a
//! slow callback only holds up its own subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use surreal_protocol::LiveNotification;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransportError;

/// Callback for live notifications. Invoked on the subscription's own task.
pub type LiveCallback = Arc<dyn Fn(LiveNotification) + Send + Sync>;

struct LiveRoute {
    queue: mpsc::UnboundedSender<LiveNotification>,
    active: Arc<AtomicBool>,
}

impl LiveRoute {
    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

pub struct LiveRegistry {
    routes: DashMap<String, LiveRoute>,
    runtime: Handle,
}

impl LiveRegistry {
    /// Drain tasks are spawned on `runtime`, so registering works from any
    /// thread.
    pub fn new(runtime: Handle) -> Self {
        Self {
            routes: DashMap::new(),
            runtime,
        }
    }

    /// Route notifications for `subscription_id` to `callback`.
    pub fn register(&self, subscription_id: &str, callback: LiveCallback) -> Result<(), TransportError> {
        let vacant = match self.routes.entry(subscription_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(TransportError::DuplicateSubscription(subscription_id.to_string()));
            }
            Entry::Vacant(vacant) => vacant,
        };

        let (queue, mut rx) = mpsc::unbounded_channel::<LiveNotification>();
        let active = Arc::new(AtomicBool::new(true));

        let flag = active.clone();
        let id = subscription_id.to_string();
        self.runtime.spawn(async move {
            while let Some(notification) = rx.recv().await {
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                callback(notification);
            }
            debug!("Live route {id} finished");
        });

        vacant.insert(LiveRoute { queue, active });
        Ok(())
    }

    /// Queue `notification` for its subscription's callback.
    ///
    /// Returns whether a subscription with that id exists.
    pub fn dispatch(&self, subscription_id: &str, notification: LiveNotification) -> bool {
        match self.routes.get(subscription_id) {
            Some(route) => {
                if route.queue.send(notification).is_err() {
                    debug!("Live route {subscription_id} is no longer draining");
                }
                true
            }
            None => false,
        }
    }

    /// Stop routing to `subscription_id`. The drain task skips whatever is
    /// still queued and exits.
    pub fn remove(&self, subscription_id: &str) -> bool {
        match self.routes.remove(subscription_id) {
            Some((_, route)) => {
                route.deactivate();
                true
            }
            None => false,
        }
    }

    /// Remove every subscription. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.routes.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    pub fn contains(&self, subscription_id: &str) -> bool {
        self.routes.contains_key(subscription_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
