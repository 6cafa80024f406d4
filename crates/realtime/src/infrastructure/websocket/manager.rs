//! Connection manager - drives the [`ConnectionCore`] on tokio.
//!
//! Every input (caller command, transport lifecycle event, timer firing) is
//! turned into a [`ManagerEvent`] and pushed onto one unbounded queue. A
//! single task consumes the queue, feeds the core and applies the resulting
//! effects in order: store first, then the event bus. Nothing else mutates
//! the transport handle, the timers or the store.

use std::collections::HashMap;
use std::sync::Arc;

use portal_shared::{AuthToken, OutboundFrame};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{RealtimeConfig, NORMAL_CLOSURE};
use crate::error::ConfigError;
use crate::infrastructure::messaging::{EventBus, MessageRouter, RealtimeEvent};
use crate::ports::outbound::{
    ClockPort, Transport, TransportEvent, TransportEventSink, TransportLink,
};
use crate::state::{ConnectionStatus, ConnectionStore, StoreObserver};

use super::core::{ConnectionCore, Effect, Epoch, TimerId};

/// Work item for the manager task.
#[derive(Debug)]
enum ManagerEvent {
    Connect(Option<AuthToken>),
    Disconnect,
    /// Frame already encoded by the caller
    Send(String),
    ClearMessages,
    ClearNotifications,
    MarkNotificationsRead,
    Transport { epoch: Epoch, event: TransportEvent },
    Timer(TimerId),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the realtime connection.
///
/// Cheap to clone; all clones talk to the same manager task. Construct one
/// per authenticated application session at the composition root.
#[derive(Clone)]
pub struct ConnectionManager {
    queue: mpsc::UnboundedSender<ManagerEvent>,
    store: StoreObserver,
    events: EventBus,
}

impl ConnectionManager {
    /// Spawn the manager task. Must be called inside a tokio runtime.
    pub fn spawn(
        config: &RealtimeConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self, ConfigError> {
        let core = ConnectionCore::new(config)?;
        let (queue, rx) = mpsc::unbounded_channel();
        let store = ConnectionStore::new();
        let events = EventBus::new();

        let handle = Self {
            queue: queue.clone(),
            store: store.observer(),
            events: events.clone(),
        };

        let driver = Driver {
            core,
            transport,
            link: None,
            timers: HashMap::new(),
            store,
            router: MessageRouter::new(clock),
            events,
            queue,
        };
        tokio::spawn(driver.run(rx));

        Ok(handle)
    }

    /// Open (or re-open) the connection with `token`.
    ///
    /// Returns immediately; progress is visible through the store and the
    /// event bus. A missing or blank token sets the Error status.
    pub fn connect(&self, token: Option<AuthToken>) {
        self.enqueue(ManagerEvent::Connect(token));
    }

    /// Close the connection and cancel any scheduled reconnect.
    pub fn disconnect(&self) {
        self.enqueue(ManagerEvent::Disconnect);
    }

    /// Send a frame on the live connection.
    ///
    /// Returns false, without transmitting, when the status is not
    /// Connected or the frame cannot be encoded.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        let status = self.store.status();
        if status != ConnectionStatus::Connected {
            tracing::warn!(kind = frame.kind(), ?status, "Cannot send: not connected");
            return false;
        }
        match frame.encode() {
            Ok(text) => self.enqueue(ManagerEvent::Send(text)),
            Err(e) => {
                tracing::error!(kind = frame.kind(), error = %e, "Failed to encode outbound frame");
                false
            }
        }
    }

    /// Drop every logged message (explicit user action or logout).
    pub fn clear_messages(&self) {
        self.enqueue(ManagerEvent::ClearMessages);
    }

    pub fn clear_notifications(&self) {
        self.enqueue(ManagerEvent::ClearNotifications);
    }

    pub fn mark_notifications_read(&self) {
        self.enqueue(ManagerEvent::MarkNotificationsRead);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.store.status()
    }

    /// Read-only view of the connection state.
    pub fn store(&self) -> StoreObserver {
        self.store.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Close the connection and stop the manager task.
    ///
    /// Every clone of this handle becomes inert afterwards.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.enqueue(ManagerEvent::Shutdown(ack_tx)) {
            let _ = ack_rx.await;
        }
    }

    fn enqueue(&self, event: ManagerEvent) -> bool {
        match self.queue.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!("Connection manager has shut down");
                false
            }
        }
    }
}

/// Single owner of the core, the live transport, the timers and the store.
struct Driver {
    core: ConnectionCore,
    transport: Arc<dyn Transport>,
    link: Option<(Epoch, Box<dyn TransportLink>)>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    store: ConnectionStore,
    router: MessageRouter,
    events: EventBus,
    queue: mpsc::UnboundedSender<ManagerEvent>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ManagerEvent>) {
        tracing::debug!(endpoint = %self.core.endpoint(), "Connection manager started");

        while let Some(event) = rx.recv().await {
            let fx = match event {
                ManagerEvent::Connect(token) => self.core.connect(token),
                ManagerEvent::Disconnect => self.core.disconnect(),
                ManagerEvent::Send(text) => self.core.transmit(text).into_iter().collect(),
                ManagerEvent::ClearMessages => {
                    self.store.clear_messages();
                    Vec::new()
                }
                ManagerEvent::ClearNotifications => {
                    self.store.clear_notifications();
                    Vec::new()
                }
                ManagerEvent::MarkNotificationsRead => {
                    self.store.mark_notifications_read();
                    Vec::new()
                }
                ManagerEvent::Transport { epoch, event } => self.core.on_transport(epoch, event),
                ManagerEvent::Timer(id) => {
                    self.timers.remove(&id);
                    self.core.on_timer(id)
                }
                ManagerEvent::Shutdown(ack) => {
                    let fx = self.core.disconnect();
                    self.apply(fx).await;
                    for (_, timer) in self.timers.drain() {
                        timer.abort();
                    }
                    let _ = ack.send(());
                    break;
                }
            };
            self.apply(fx).await;
        }

        tracing::debug!("Connection manager stopped");
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenTransport { epoch, url } => {
                    let sink = self.sink(epoch);
                    let link = self.transport.open(&url, sink);
                    if let Some((old, stale)) = self.link.replace((epoch, link)) {
                        // The core closes a live transport before opening another.
                        tracing::debug!(epoch = old, "Dropping superseded transport link");
                        stale.close(NORMAL_CLOSURE);
                    }
                }
                Effect::CloseTransport { epoch, code } => {
                    if matches!(&self.link, Some((live, _)) if *live == epoch) {
                        if let Some((_, link)) = self.link.take() {
                            link.close(code);
                        }
                    }
                }
                Effect::Transmit { epoch, text } => match &self.link {
                    Some((live, link)) if *live == epoch => {
                        if let Err(e) = link.send_text(text) {
                            tracing::error!(epoch, error = %e, "Failed to send frame");
                        }
                    }
                    _ => tracing::debug!(epoch, "No link for transmit"),
                },
                Effect::StartTimer { id, kind, delay } => {
                    tracing::debug!(?id, ?kind, delay_ms = delay.as_millis() as u64, "Arming timer");
                    let queue = self.queue.clone();
                    let timer = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = queue.send(ManagerEvent::Timer(id));
                    });
                    self.timers.insert(id, timer);
                }
                Effect::CancelTimer { id } => {
                    if let Some(timer) = self.timers.remove(&id) {
                        timer.abort();
                    }
                }
                Effect::Status(status) => {
                    self.store.set_status(status);
                    self.events
                        .dispatch(RealtimeEvent::StatusChanged(status))
                        .await;
                }
                Effect::Error { kind, message } => {
                    self.store.set_error(Some(message.clone()));
                    self.events
                        .dispatch(RealtimeEvent::ConnectionError { kind, message })
                        .await;
                }
                Effect::ClearError => self.store.set_error(None),
                Effect::Route(text) => {
                    if let Some(frame) = self.router.route(&text, &self.store) {
                        self.events.dispatch(RealtimeEvent::Frame(frame)).await;
                    }
                }
            }
        }
    }

    /// Sink that tags every event from this transport with its epoch.
    fn sink(&self, epoch: Epoch) -> TransportEventSink {
        let queue = self.queue.clone();
        TransportEventSink::new(move |event| {
            let _ = queue.send(ManagerEvent::Transport { epoch, event });
        })
    }
}

#[cfg(test)]
mod tests;
