//! Test doubles for the outbound ports.
//!
//! Available to unit tests and, with the `testing` feature, to downstream
//! crates that drive a `ConnectionManager` without a network.

mod fake_transport;

pub use super::clock::FixedClock;
pub use fake_transport::FakeTransport;
