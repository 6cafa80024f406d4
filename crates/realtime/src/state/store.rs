//! Connection state store.
//!
//! `RealtimeState` is a plain data container with total, synchronous
//! mutations. `ConnectionStore` is the single write handle (held by the
//! connection manager); `StoreObserver` hands out read-only views to the UI
//! and is notified after every change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use portal_shared::{InboundFrame, Notification, RefId};
use tokio::sync::watch;

/// Connection status shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Last known online state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineStatus {
    pub online: bool,
    pub timestamp: DateTime<Utc>,
}

/// Everything the realtime connection exposes to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeState {
    status: ConnectionStatus,
    error: Option<String>,
    messages: HashMap<RefId, Vec<InboundFrame>>,
    online: HashMap<String, OnlineStatus>,
    notifications: Vec<Notification>,
    notifications_read: usize,
}

impl RealtimeState {
    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Set (or clear, with `None`) the user-visible error message.
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Append in arrival order under the conversation/reference id.
    pub fn append_message(&mut self, ref_id: RefId, frame: InboundFrame) {
        self.messages.entry(ref_id).or_default().push(frame);
    }

    /// Last write wins per user id.
    pub fn update_online_status(&mut self, user_id: impl Into<String>, status: OnlineStatus) {
        self.online.insert(user_id.into(), status);
    }

    pub fn add_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn mark_notifications_read(&mut self) {
        self.notifications_read = self.notifications.len();
    }

    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
        self.notifications_read = 0;
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Frames logged for a conversation, oldest first.
    pub fn messages(&self, ref_id: &RefId) -> &[InboundFrame] {
        self.messages
            .get(ref_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn conversation_ids(&self) -> impl Iterator<Item = &RefId> {
        self.messages.keys()
    }

    /// Whether a delivery receipt for message `id` has arrived in `ref_id`.
    pub fn is_delivered(&self, ref_id: &RefId, id: &str) -> bool {
        self.messages(ref_id).iter().any(|frame| {
            matches!(frame, InboundFrame::DeliveryReceipt(receipt) if receipt.id == id)
        })
    }

    pub fn online_status(&self, user_id: &str) -> Option<OnlineStatus> {
        self.online.get(user_id).copied()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_status(user_id).is_some_and(|s| s.online)
    }

    pub fn online_users(&self) -> impl Iterator<Item = &str> {
        self.online
            .iter()
            .filter(|(_, status)| status.online)
            .map(|(user_id, _)| user_id.as_str())
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn unread_notifications(&self) -> &[Notification] {
        &self.notifications[self.notifications_read.min(self.notifications.len())..]
    }
}

/// Write handle to the realtime state. Only the connection manager holds one.
#[derive(Debug)]
pub struct ConnectionStore {
    tx: watch::Sender<RealtimeState>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RealtimeState::default());
        Self { tx }
    }

    pub fn observer(&self) -> StoreObserver {
        StoreObserver {
            rx: self.tx.subscribe(),
        }
    }

    /// Current status without cloning the state.
    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().status()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.tx.send_if_modified(|state| {
            if state.status == status {
                return false;
            }
            state.set_status(status);
            true
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.tx.send_if_modified(|state| {
            if state.error == error {
                return false;
            }
            state.set_error(error);
            true
        });
    }

    pub fn append_message(&self, ref_id: RefId, frame: InboundFrame) {
        self.tx.send_modify(|state| state.append_message(ref_id, frame));
    }

    pub fn update_online_status(&self, user_id: impl Into<String>, status: OnlineStatus) {
        let user_id = user_id.into();
        self.tx
            .send_modify(|state| state.update_online_status(user_id, status));
    }

    pub fn add_notification(&self, notification: Notification) {
        self.tx
            .send_modify(|state| state.add_notification(notification));
    }

    pub fn clear_messages(&self) {
        self.tx.send_modify(RealtimeState::clear_messages);
    }

    pub fn mark_notifications_read(&self) {
        self.tx.send_modify(RealtimeState::mark_notifications_read);
    }

    pub fn clear_notifications(&self) {
        self.tx.send_modify(RealtimeState::clear_notifications);
    }
}

impl Default for ConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the realtime state for UI binding.
///
/// Cheap to clone. Reads return owned snapshots so callers never hold the
/// store's lock.
#[derive(Debug, Clone)]
pub struct StoreObserver {
    rx: watch::Receiver<RealtimeState>,
}

impl StoreObserver {
    pub fn snapshot(&self) -> RealtimeState {
        self.rx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.rx.borrow().status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn error(&self) -> Option<String> {
        self.rx.borrow().error().map(str::to_string)
    }

    pub fn messages(&self, ref_id: &RefId) -> Vec<InboundFrame> {
        self.rx.borrow().messages(ref_id).to_vec()
    }

    pub fn online_status(&self, user_id: &str) -> Option<OnlineStatus> {
        self.rx.borrow().online_status(user_id)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.rx.borrow().notifications().to_vec()
    }

    /// Wait for the next change. Returns false once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until `predicate` holds, returning the matching snapshot.
    ///
    /// Returns `None` if the store is dropped first.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<RealtimeState>
    where
        F: FnMut(&RealtimeState) -> bool,
    {
        self.rx
            .wait_for(|state| predicate(state))
            .await
            .ok()
            .map(|state| RealtimeState::clone(&state))
    }
}
