//! Message router: parse inbound text frames and apply them to the store.
//!
//! Malformed frames are logged and dropped here. They never reach the UI and
//! never affect the connection status.

use std::sync::Arc;

use portal_shared::{parse_inbound, InboundFrame};

use crate::error::RealtimeError;
use crate::ports::outbound::ClockPort;
use crate::state::{ConnectionStore, OnlineStatus};

pub struct MessageRouter {
    clock: Arc<dyn ClockPort>,
}

impl MessageRouter {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self { clock }
    }

    /// Route one inbound frame.
    ///
    /// Returns the classified frame so the caller can publish it, or `None`
    /// when the payload was malformed.
    pub fn route(&self, text: &str, store: &ConnectionStore) -> Option<InboundFrame> {
        let frame = match parse_inbound(text, self.clock.now()) {
            Ok(frame) => frame,
            Err(e) => {
                let error = RealtimeError::from(e);
                tracing::warn!(error = %error, len = text.len(), "Dropping inbound frame");
                return None;
            }
        };

        match &frame {
            InboundFrame::Presence(update) => store.update_online_status(
                update.user_id.clone(),
                OnlineStatus {
                    online: update.online,
                    timestamp: update.timestamp,
                },
            ),
            InboundFrame::Message(msg) => store.append_message(msg.ref_id.clone(), frame.clone()),
            InboundFrame::DeliveryReceipt(receipt) => {
                store.append_message(receipt.ref_id.clone(), frame.clone())
            }
            InboundFrame::Notification(notification) => {
                store.add_notification(notification.clone())
            }
            InboundFrame::Unknown { .. } => match frame.ref_id() {
                Some(ref_id) => store.append_message(ref_id, frame.clone()),
                None => tracing::debug!("Unclassified frame without reference id"),
            },
        }

        tracing::trace!(kind = frame.kind(), "Routed inbound frame");
        Some(frame)
    }
}
