//! Viewer fan-out registry.
//!
//! Each subscriber owns a bounded `mpsc` queue drained by its transport task
//! (see `server::ws`). `publish` never waits: a subscriber whose queue is full
//! or closed is evicted on the spot and delivery to the others continues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::core::types::ServerEvent;

/// Default per-subscriber buffer, in events.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Identifier handed out by `subscribe`.
pub type SubscriberId = u64;

/// Receiving side of a registration.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Registry of live viewers.
#[derive(Debug)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<ServerEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<ServerEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber.
    ///
    /// `baseline` events are queued before the subscriber becomes visible to
    /// `publish`, so they are always the first things it receives.
    pub fn subscribe<I>(&self, baseline: I) -> Subscription
    where
        I: IntoIterator<Item = ServerEvent>,
    {
        let (tx, rx) = mpsc::channel(self.buffer);
        for event in baseline {
            if tx.try_send(event).is_err() {
                break;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let total = {
            let mut registry = self.registry();
            registry.insert(id, tx);
            registry.len()
        };

        info!(subscriber = id, total = total, "Subscriber connected");
        Subscription { id, events: rx }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut registry = self.registry();
            let removed = registry.remove(&id).is_some();
            (removed, registry.len())
        };
        if removed {
            info!(subscriber = id, total = total, "Subscriber disconnected");
        }
        removed
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Iterates over a snapshot of the registry. Returns the number of
    /// subscribers the event was queued for.
    pub fn publish(&self, event: ServerEvent) -> usize {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<ServerEvent>)> = self
            .registry()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, event = event.kind(), "Subscriber stalled, evicting");
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = id, event = event.kind(), "Subscriber gone, evicting");
                    evicted.push(id);
                }
            }
        }

        if !evicted.is_empty() {
            let mut registry = self.registry();
            for id in evicted {
                registry.remove(&id);
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
