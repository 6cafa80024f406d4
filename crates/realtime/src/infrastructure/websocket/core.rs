//! Platform-agnostic core of the realtime connection.
//!
//! This is deliberately free of any runtime dependency (no tokio, no sockets,
//! no timers). The driver feeds it commands, transport events and timer
//! firings one at a time, and applies the returned [`Effect`]s in order.
//!
//! Two tags keep stale work from leaking into the current connection:
//! - every opened transport gets a fresh epoch, and events from any other
//!   epoch are ignored, so at most one transport is ever live;
//! - every armed timer gets a fresh [`TimerId`], and firings for an id that
//!   is no longer armed are ignored.

use std::time::Duration;

use portal_shared::{AuthToken, OutboundFrame};
use url::Url;

use crate::config::{RealtimeConfig, NORMAL_CLOSURE};
use crate::error::{ConfigError, ErrorKind, RealtimeError};
use crate::ports::outbound::TransportEvent;
use crate::state::ConnectionStatus;

use super::reconnect::ReconnectPolicy;

/// Generation number of an opened transport.
pub type Epoch = u64;

/// Identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ConnectTimeout,
    Reconnect,
}

/// Side effect requested by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new transport tagged with `epoch`
    OpenTransport { epoch: Epoch, url: Url },
    /// Close the transport tagged with `epoch`
    CloseTransport { epoch: Epoch, code: u16 },
    /// Write a text frame on the transport tagged with `epoch`
    Transmit { epoch: Epoch, text: String },
    /// Arm a one-shot timer; fire it back through `on_timer(id)`
    StartTimer {
        id: TimerId,
        kind: TimerKind,
        delay: Duration,
    },
    /// Disarm a timer started earlier
    CancelTimer { id: TimerId },
    /// Store the new connection status
    Status(ConnectionStatus),
    /// Store a user-visible error and publish it
    Error { kind: ErrorKind, message: String },
    /// Clear the stored error
    ClearError,
    /// Hand an inbound text frame to the message router
    Route(String),
}

/// Connection state machine.
///
/// `Disconnected → Connecting → {Connected | Error}`, `Connected →
/// Disconnected` on close, `Error/Disconnected → Connecting` on retry or
/// explicit connect.
#[derive(Debug)]
pub struct ConnectionCore {
    endpoint: Url,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    token: Option<AuthToken>,
    live: Option<Epoch>,
    next_epoch: Epoch,
    next_timer: u64,
    connect_timer: Option<TimerId>,
    retry_timer: Option<TimerId>,
}

impl ConnectionCore {
    pub fn new(config: &RealtimeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: config.ws_endpoint()?,
            connect_timeout: config.connect_timeout,
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            status: ConnectionStatus::Disconnected,
            token: None,
            live: None,
            next_epoch: 0,
            next_timer: 0,
            connect_timer: None,
            retry_timer: None,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn live_epoch(&self) -> Option<Epoch> {
        self.live
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.retry_timer.is_some()
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Open a fresh connection authenticated with `token`.
    ///
    /// Any live transport is closed first and the reconnect budget is reset.
    pub fn connect(&mut self, token: Option<AuthToken>) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.cancel_timers(&mut fx);
        self.close_live(NORMAL_CLOSURE, &mut fx);

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::warn!("Connect requested without an access token");
            self.token = None;
            self.fail(RealtimeError::MissingToken, &mut fx);
            return fx;
        };

        self.token = Some(token);
        self.policy.reset();
        self.open_transport(&mut fx);
        fx
    }

    /// Close the connection and suppress any pending automatic reconnect.
    pub fn disconnect(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.cancel_timers(&mut fx);
        self.close_live(NORMAL_CLOSURE, &mut fx);
        self.token = None;
        self.set_status(ConnectionStatus::Disconnected, &mut fx);
        fx
    }

    /// Transmit an encoded frame on the live transport.
    ///
    /// Returns `None` (and transmits nothing) unless the status is Connected.
    pub fn transmit(&self, text: String) -> Option<Effect> {
        match (self.status, self.live) {
            (ConnectionStatus::Connected, Some(epoch)) => Some(Effect::Transmit { epoch, text }),
            _ => {
                tracing::warn!(status = ?self.status, "Dropping outbound frame: not connected");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Inputs
    // -------------------------------------------------------------------------

    pub fn on_transport(&mut self, epoch: Epoch, event: TransportEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.live != Some(epoch) {
            tracing::debug!(epoch, live = ?self.live, ?event, "Ignoring event from stale transport");
            return fx;
        }

        match event {
            TransportEvent::Opened => {
                tracing::info!(epoch, url = %self.endpoint, "Realtime connection open");
                self.cancel_connect_timer(&mut fx);
                self.policy.reset();
                if let Some(token) = &self.token {
                    match OutboundFrame::auth(token).encode() {
                        Ok(text) => {
                            tracing::debug!(epoch, "Sending auth frame");
                            fx.push(Effect::Transmit { epoch, text });
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to encode auth frame"),
                    }
                }
                fx.push(Effect::ClearError);
                self.set_status(ConnectionStatus::Connected, &mut fx);
            }
            TransportEvent::Message(text) => fx.push(Effect::Route(text)),
            TransportEvent::Error(message) => {
                tracing::warn!(epoch, %message, "Realtime transport error");
                self.set_status(ConnectionStatus::Error, &mut fx);
            }
            TransportEvent::Closed { code } => {
                tracing::info!(epoch, code, "Realtime connection closed");
                self.live = None;
                self.cancel_connect_timer(&mut fx);
                self.set_status(ConnectionStatus::Disconnected, &mut fx);
                if code != NORMAL_CLOSURE {
                    self.schedule_reconnect(&mut fx);
                }
            }
        }
        fx
    }

    pub fn on_timer(&mut self, id: TimerId) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.connect_timer == Some(id) {
            self.connect_timer = None;
            tracing::warn!(timeout_ms = self.connect_timeout.as_millis() as u64, "Connection timeout");
            self.close_live(NORMAL_CLOSURE, &mut fx);
            self.fail(RealtimeError::ConnectTimeout, &mut fx);
            self.schedule_reconnect(&mut fx);
        } else if self.retry_timer == Some(id) {
            self.retry_timer = None;
            if self.token.is_some() {
                tracing::info!(
                    attempt = self.policy.attempts(),
                    max = self.policy.max_attempts(),
                    "Reconnecting"
                );
                self.open_transport(&mut fx);
            }
        } else {
            tracing::debug!(?id, "Ignoring disarmed timer");
        }
        fx
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn open_transport(&mut self, fx: &mut Vec<Effect>) {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.live = Some(epoch);
        self.set_status(ConnectionStatus::Connecting, fx);
        fx.push(Effect::OpenTransport {
            epoch,
            url: self.endpoint.clone(),
        });

        let id = self.arm_timer();
        self.connect_timer = Some(id);
        fx.push(Effect::StartTimer {
            id,
            kind: TimerKind::ConnectTimeout,
            delay: self.connect_timeout,
        });
    }

    fn schedule_reconnect(&mut self, fx: &mut Vec<Effect>) {
        match self.policy.next_delay() {
            Some(delay) => {
                tracing::info!(
                    attempt = self.policy.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                let id = self.arm_timer();
                self.retry_timer = Some(id);
                fx.push(Effect::StartTimer {
                    id,
                    kind: TimerKind::Reconnect,
                    delay,
                });
            }
            None => {
                tracing::error!(
                    attempts = self.policy.attempts(),
                    "Max reconnection attempts reached, giving up"
                );
                self.fail(
                    RealtimeError::ReconnectExhausted {
                        attempts: self.policy.max_attempts(),
                    },
                    fx,
                );
            }
        }
    }

    fn fail(&mut self, error: RealtimeError, fx: &mut Vec<Effect>) {
        self.set_status(ConnectionStatus::Error, fx);
        fx.push(Effect::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn set_status(&mut self, status: ConnectionStatus, fx: &mut Vec<Effect>) {
        if self.status != status {
            self.status = status;
            fx.push(Effect::Status(status));
        }
    }

    fn close_live(&mut self, code: u16, fx: &mut Vec<Effect>) {
        if let Some(epoch) = self.live.take() {
            fx.push(Effect::CloseTransport { epoch, code });
        }
    }

    fn arm_timer(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }

    fn cancel_connect_timer(&mut self, fx: &mut Vec<Effect>) {
        if let Some(id) = self.connect_timer.take() {
            fx.push(Effect::CancelTimer { id });
        }
    }

    fn cancel_timers(&mut self, fx: &mut Vec<Effect>) {
        self.cancel_connect_timer(fx);
        if let Some(id) = self.retry_timer.take() {
            fx.push(Effect::CancelTimer { id });
        }
    }
}
