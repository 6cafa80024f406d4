//! Realtime state exposed to the UI layer.

mod store;

pub use store::{ConnectionStatus, ConnectionStore, OnlineStatus, RealtimeState, StoreObserver};
