//! Realtime event fan-out.
//!
//! The connection manager dispatches an event only after the store reflects
//! it, so a subscriber reading the store from its callback sees the new state.
//! Subscribers either take every event or name the [`EventKind`]s they care
//! about; a presence widget has no use for status changes, a connection
//! banner no use for frames.

use std::sync::Arc;

use portal_shared::InboundFrame;
use tokio::sync::Mutex;

use crate::error::ErrorKind;
use crate::state::ConnectionStatus;

/// Event published by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The connection status changed
    StatusChanged(ConnectionStatus),
    /// A user-visible connection error occurred
    ConnectionError { kind: ErrorKind, message: String },
    /// An inbound frame was routed into the store
    Frame(InboundFrame),
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusChanged(_) => EventKind::Status,
            Self::ConnectionError { .. } => EventKind::Error,
            Self::Frame(_) => EventKind::Frame,
        }
    }
}

/// Subscription filter over [`RealtimeEvent`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Status,
    Error,
    Frame,
}

/// Handle returned by `subscribe*`, usable with [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    /// `None` takes every event
    kinds: Option<Vec<EventKind>>,
    callback: Box<dyn FnMut(RealtimeEvent) + Send + 'static>,
}

impl Subscriber {
    fn wants(&self, kind: EventKind) -> bool {
        match &self.kinds {
            None => true,
            Some(kinds) => kinds.contains(&kind),
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<Subscriber>,
}

/// Event bus for realtime events. Clones share one subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event.
    pub async fn subscribe(
        &self,
        callback: impl FnMut(RealtimeEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.register(None, Box::new(callback)).await
    }

    /// Subscribe to events of the given kinds only.
    pub async fn subscribe_to(
        &self,
        kinds: &[EventKind],
        callback: impl FnMut(RealtimeEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.register(Some(kinds.to_vec()), Box::new(callback)).await
    }

    async fn register(
        &self,
        kinds: Option<Vec<EventKind>>,
        callback: Box<dyn FnMut(RealtimeEvent) + Send + 'static>,
    ) -> SubscriptionId {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers.entries.push(Subscriber {
            id,
            kinds,
            callback,
        });
        id
    }

    /// Returns false if `id` was not subscribed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let before = subscribers.entries.len();
        subscribers.entries.retain(|s| s.id != id);
        subscribers.entries.len() != before
    }

    /// Deliver `event` to matching subscribers, in subscription order.
    pub async fn dispatch(&self, event: RealtimeEvent) {
        let kind = event.kind();
        let mut subscribers = self.subscribers.lock().await;
        for subscriber in subscribers.entries.iter_mut().filter(|s| s.wants(kind)) {
            (subscriber.callback)(event.clone());
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.entries.len()
    }

    pub async fn clear(&self) {
        self.subscribers.lock().await.entries.clear();
    }
}
