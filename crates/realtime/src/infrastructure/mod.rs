//! Infrastructure adapters: socket transport, connection driver, messaging
//! and clock.

pub mod clock;
pub mod messaging;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
