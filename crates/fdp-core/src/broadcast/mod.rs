//! Live-update fan-out to subscribers.
//!
//! Producers call [`Broadcaster::broadcast`], which never blocks: each
//! subscriber has a bounded queue and a pushed snapshot is dropped for any
//! subscriber whose queue is full. A per-subscriber actor drains the queue and
//! hands at most one snapshot per debounce window to the transport.

mod actor;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::BroadcastConfig;
use crate::task::Task;

/// Point-in-time copy of the registry, shared by every queue it is pushed to.
pub type Snapshot = Arc<Vec<Task>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The transport refused a write; the subscriber is gone.
#[derive(Debug, Error)]
#[error("subscriber closed: {0}")]
pub struct SinkClosed(pub String);

/// Physical delivery of snapshots to one connection (websocket, terminal, ...).
pub trait SubscriberSink: Send + 'static {
    fn deliver(&mut self, tasks: &[Task]) -> Result<(), SinkClosed>;
}

struct Shared {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Snapshot>>>,
    next_id: AtomicU64,
    queue: usize,
    debounce: Duration,
}

impl Shared {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Snapshot>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Broadcaster {
    pub fn new(queue: usize, debounce: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue: queue.max(1),
                debounce,
            }),
        }
    }

    pub fn from_config(cfg: &BroadcastConfig) -> Self {
        Self::new(cfg.subscriber_queue, Duration::from_millis(cfg.debounce_ms))
    }

    /// Registers a sink and spawns its delivery actor. Must be called within a tokio runtime.
    pub fn subscribe(&self, sink: Box<dyn SubscriberSink>) -> SubscriberId {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.shared.queue);
        let count = {
            let mut subs = self.shared.subscribers();
            subs.insert(id, tx);
            subs.len()
        };
        let membership = actor::Membership {
            shared: Arc::downgrade(&self.shared),
            id,
        };
        tokio::spawn(actor::run(rx, sink, self.shared.debounce, membership));
        tracing::info!(subscriber = %id, active = count, "subscriber added");
        id
    }

    /// Queues `snapshot` for every subscriber with room; returns how many took it.
    pub fn broadcast(&self, snapshot: Snapshot) -> usize {
        let subs = self.shared.subscribers();
        let mut queued = 0;
        for (id, tx) in subs.iter() {
            match tx.try_send(Arc::clone(&snapshot)) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::trace!(subscriber = %id, "queue full, update dropped");
                }
                // Actor already exiting; its membership guard removes the entry.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        queued
    }

    /// Drops the subscriber's queue; its actor exits once it notices.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.subscribers().remove(&id).is_some()
    }

    pub fn count(&self) -> usize {
        self.shared.subscribers().len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::from_config(&BroadcastConfig::default())
    }
}
