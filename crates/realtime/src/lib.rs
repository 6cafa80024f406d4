//! Portal Realtime - the business portal's live messaging connection
//!
//! Owns one authenticated WebSocket to the messaging server and keeps the
//! UI-facing realtime state (status, per-conversation message log, presence,
//! notifications) in sync with it.
//!
//! # Layers
//!
//! - [`ports`]: transport and clock contracts
//! - [`infrastructure`]: connection core and driver, socket adapter, router,
//!   event bus
//! - [`state`]: the connection state store
//! - [`application`]: auth lifecycle binding
//!
//! ```no_run
//! # async fn run() -> Result<(), portal_realtime::error::ConfigError> {
//! use std::sync::Arc;
//! use portal_realtime::{ConnectionManager, RealtimeConfig, SystemClock, WsTransport};
//! use portal_shared::AuthToken;
//!
//! let config = RealtimeConfig::from_env()?;
//! let manager = ConnectionManager::spawn(
//!     &config,
//!     Arc::new(WsTransport::new()),
//!     Arc::new(SystemClock::new()),
//! )?;
//! manager.connect(Some(AuthToken::new("token")));
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod ports;
pub mod state;

pub use application::services::{bind_auth_lifecycle, AuthState, SessionService};
pub use config::{RealtimeConfig, ReconnectConfig};
pub use error::{ConfigError, ErrorKind, RealtimeError};
pub use infrastructure::clock::SystemClock;
pub use infrastructure::messaging::{EventBus, EventKind, RealtimeEvent, SubscriptionId};
pub use infrastructure::websocket::{ConnectionManager, WsTransport};
pub use state::{ConnectionStatus, OnlineStatus, RealtimeState, StoreObserver};
