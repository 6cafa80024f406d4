//! Session service binding the realtime connection to the auth lifecycle.
//!
//! The portal's auth layer publishes an [`AuthState`] through a
//! `tokio::sync::watch` channel. This service reacts to its transitions:
//! - signing in (or a new token while signed in) opens the connection;
//! - signing out closes it and drops the message log and notifications.
//!
//! Token expiry is never inspected here; refreshing the token is the auth
//! layer's job, and a refreshed token shows up as a new `AuthState`.

use portal_shared::AuthToken;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::infrastructure::websocket::ConnectionManager;

/// Authentication state as published by the auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<AuthToken>,
    pub authenticated: bool,
}

impl AuthState {
    pub fn signed_in(token: AuthToken) -> Self {
        Self {
            token: Some(token),
            authenticated: true,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Authenticated with a token to hand to the connection.
    fn is_active(&self) -> bool {
        self.authenticated && self.token.is_some()
    }
}

pub struct SessionService {
    manager: ConnectionManager,
}

impl SessionService {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// React to one auth transition.
    pub fn on_auth_changed(&self, previous: &AuthState, current: &AuthState) {
        match (previous.is_active(), current.is_active()) {
            (false, true) => {
                tracing::info!("Signed in, opening realtime connection");
                self.manager.connect(current.token.clone());
            }
            (true, true) if previous.token != current.token => {
                tracing::info!("Access token changed, reconnecting");
                self.manager.connect(current.token.clone());
            }
            (true, false) => {
                tracing::info!("Signed out, closing realtime connection");
                self.manager.disconnect();
                self.manager.clear_messages();
                self.manager.clear_notifications();
            }
            _ => {}
        }
    }

    /// Follow `auth` until its sender is dropped.
    ///
    /// The current value is applied immediately, so a session that is already
    /// signed in connects right away.
    pub fn bind(self, mut auth: watch::Receiver<AuthState>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut previous = AuthState::signed_out();
            loop {
                let current = auth.borrow_and_update().clone();
                self.on_auth_changed(&previous, &current);
                previous = current;

                if auth.changed().await.is_err() {
                    tracing::debug!("Auth state channel closed");
                    break;
                }
            }
        })
    }
}

/// Connect `manager` to the auth lifecycle published on `auth`.
pub fn bind_auth_lifecycle(
    manager: ConnectionManager,
    auth: watch::Receiver<AuthState>,
) -> JoinHandle<()> {
    SessionService::new(manager).bind(auth)
}
