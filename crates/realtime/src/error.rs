//! Error types for the realtime connection.
//!
//! `RealtimeError` is the failure taxonomy of the connection manager. None of
//! these are returned to callers of `connect`/`disconnect`/`send`; they are
//! written to the store's error field and published on the event bus. The
//! `Display` text is the message the UI shows.

use portal_shared::FrameError;
use thiserror::Error;

/// Failure taxonomy of the realtime connection.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// `connect` was called without a usable access token.
    #[error("Authentication token is missing")]
    MissingToken,

    /// The transport did not open within the configured timeout.
    #[error("Connection timeout")]
    ConnectTimeout,

    /// The socket reported an error. Recovery goes through the reconnect policy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be parsed. Logged and dropped.
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// Automatic reconnection gave up. Terminal until `connect` is called again.
    #[error("Unable to reconnect to the messaging server after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl RealtimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingToken => ErrorKind::MissingToken,
            Self::ConnectTimeout => ErrorKind::ConnectTimeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::MalformedFrame(_) => ErrorKind::MalformedFrame,
            Self::ReconnectExhausted { .. } => ErrorKind::ReconnectExhausted,
        }
    }
}

/// Payload-free discriminant of [`RealtimeError`], carried on events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingToken,
    ConnectTimeout,
    Transport,
    MalformedFrame,
    ReconnectExhausted,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme `{0}` (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("invalid value for {var}: `{value}`")]
    InvalidNumber { var: &'static str, value: String },

    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}
