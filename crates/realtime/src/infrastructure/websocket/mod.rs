//! Realtime WebSocket connection
//!
//! - `core`: runtime-free state machine (status, epochs, timers)
//! - `reconnect`: capped exponential backoff policy
//! - `manager`: tokio driver owning the core, the socket link and the store
//! - `client`: tokio-tungstenite transport adapter

mod client;
mod core;
mod manager;
mod reconnect;

#[cfg(test)]
mod e2e_tests;

pub use self::client::{WsTransport, ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};
pub use self::core::{ConnectionCore, Effect, Epoch, TimerId, TimerKind};
pub use self::manager::ConnectionManager;
pub use self::reconnect::ReconnectPolicy;
