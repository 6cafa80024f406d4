//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters must implement,
//! so the connection manager can be driven by a real socket in production and
//! by in-memory fakes in tests.

pub mod clock_port;
pub mod transport_port;

pub use clock_port::ClockPort;
pub use transport_port::{Transport, TransportEvent, TransportEventSink, TransportLink};
