//! Socket transport using tokio-tungstenite

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::RealtimeError;
use crate::ports::outbound::{Transport, TransportEventSink, TransportLink};

/// Close code reported when the socket dies without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer's close frame carries no code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Commands from the link handle to the socket task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close(u16),
}

/// Transport backed by a real WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url, events: TransportEventSink) -> Box<dyn TransportLink> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.clone(), events, rx));
        Box::new(WsLink { tx })
    }
}

/// Handle to one socket task. Dropping it ends the task once queued frames
/// are flushed.
struct WsLink {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl TransportLink for WsLink {
    fn send_text(&self, text: String) -> Result<(), RealtimeError> {
        self.tx
            .send(Outgoing::Text(text))
            .map_err(|_| RealtimeError::Transport("socket task has stopped".into()))
    }

    fn close(&self, code: u16) {
        // The task may already be gone; nothing left to close then.
        let _ = self.tx.send(Outgoing::Close(code));
    }
}

async fn run_socket(
    url: Url,
    events: TransportEventSink,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    // A close requested while the handshake is pending abandons it.
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((ws_stream, _)) => break ws_stream,
                Err(e) => {
                    tracing::error!(%url, error = %e, "Failed to connect to messaging server");
                    events.error(e.to_string());
                    events.closed(ABNORMAL_CLOSURE);
                    return;
                }
            },
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Close(code)) => {
                    tracing::debug!(%url, code, "Connect abandoned");
                    events.closed(code);
                    return;
                }
                Some(Outgoing::Text(_)) => {
                    tracing::warn!("Dropping frame queued before the socket opened");
                }
                None => return,
            },
        }
    };

    tracing::info!(%url, "Connected to messaging server");
    events.opened();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!(error = %e, "Failed to send frame");
                        events.error(e.to_string());
                        events.closed(ABNORMAL_CLOSURE);
                        return;
                    }
                }
                Some(Outgoing::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    events.closed(code);
                    return;
                }
                None => {
                    // Link handle dropped without an explicit close.
                    let _ = write.close().await;
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(NO_STATUS_RECEIVED);
                    tracing::info!(code, "Server closed connection");
                    // Completes the handshake by flushing the queued close reply.
                    if let Err(e) = write.close().await {
                        tracing::debug!(error = %e, "Close reply not delivered");
                    }
                    events.closed(code);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket error");
                    events.error(e.to_string());
                    events.closed(ABNORMAL_CLOSURE);
                    return;
                }
                None => {
                    tracing::info!("Socket stream ended");
                    events.closed(ABNORMAL_CLOSURE);
                    return;
                }
            },
        }
    }
}
