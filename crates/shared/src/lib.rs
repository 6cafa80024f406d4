//! Portal Shared - wire vocabulary for the realtime messaging connection
//!
//! This crate contains the types exchanged with the messaging server:
//! - Outbound frames (auth handshake, text messages, custom payloads)
//! - Inbound frames (presence, messages, delivery receipts, notifications)
//! - The authentication token read by the connection manager
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, chrono, uuid and thiserror
//! 2. **No I/O** - Pure data types, encoding and parsing
//! 3. **Never panics on input** - Malformed frames become `FrameError`

pub mod error;
pub mod inbound;
pub mod messages;
pub mod types;

pub use error::FrameError;
pub use inbound::{
    parse_inbound, ChatMessage, DeliveryReceipt, InboundFrame, Notification, PresenceUpdate,
};
pub use messages::OutboundFrame;
pub use types::{AuthToken, ConversationType, RefId};
