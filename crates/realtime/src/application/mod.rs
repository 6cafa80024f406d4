//! Application layer - orchestration on top of the connection manager.

pub mod services;
