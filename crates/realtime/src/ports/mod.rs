//! Ports layer - interfaces the connection manager depends on.

pub mod outbound;
