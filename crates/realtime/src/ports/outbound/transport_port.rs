//! Transport Port - Outbound port for the full-duplex socket
//!
//! A transport opens exactly one socket per call to [`Transport::open`] and
//! reports its lifecycle through the [`TransportEventSink`] it was handed.
//! Reporting is fire-and-forget: the sink pushes each event onto the
//! connection manager's queue, where events are processed one at a time.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::RealtimeError;

/// Lifecycle event raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and can carry frames
    Opened,
    /// A text frame arrived
    Message(String),
    /// The socket reported an error; a `Closed` event follows
    Error(String),
    /// The socket is closed; `code` is the WebSocket close code
    Closed { code: u16 },
}

/// Callback handle a transport uses to report lifecycle events.
#[derive(Clone)]
pub struct TransportEventSink {
    emit: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl TransportEventSink {
    pub fn new<F>(emit: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.emit)(event);
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    pub fn closed(&self, code: u16) {
        self.emit(TransportEvent::Closed { code });
    }
}

impl fmt::Debug for TransportEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEventSink").finish_non_exhaustive()
    }
}

/// Factory for socket connections.
///
/// `open` returns immediately; the outcome arrives later as `Opened` or
/// `Error` + `Closed` on the sink.
pub trait Transport: Send + Sync {
    fn open(&self, url: &Url, events: TransportEventSink) -> Box<dyn TransportLink>;
}

/// Handle to one opened (or opening) socket.
pub trait TransportLink: Send {
    /// Queue a text frame for transmission.
    fn send_text(&self, text: String) -> Result<(), RealtimeError>;

    /// Close the socket with the given close code. Idempotent.
    fn close(&self, code: u16);
}
