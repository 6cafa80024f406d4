//! Application services

pub mod session_service;

pub use session_service::{bind_auth_lifecycle, AuthState, SessionService};
