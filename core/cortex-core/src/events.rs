//! Change notifications emitted by the entity stores.
//!
//! Stores call [`EventSink::emit`] after every successful mutation. The default sink
//! discards events; [`EventBus`] fans them out to in-process subscribers without ever
//! blocking the writer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    CommentAdded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Entity kind label, e.g. "ticket" or "doc".
    pub entity: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<PathBuf>,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: Event) {}
}

pub type SubscriptionId = u64;

/// Default per-subscriber queue depth.
pub const DEFAULT_CAPACITY: usize = 64;

/// In-process pub/sub over bounded channels.
///
/// A subscriber whose queue is full misses the event. Subscribers whose receiver was
/// dropped are pruned on the next emit.
#[derive(Debug)]
pub struct EventBus {
    subscribers: Mutex<HashMap<SubscriptionId, SyncSender<Event>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> (SubscriptionId, Receiver<Event>) {
        let (tx, rx) = sync_channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: Event) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(subscriber = *id, event_id = %event.id, "Event dropped for slow subscriber");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
