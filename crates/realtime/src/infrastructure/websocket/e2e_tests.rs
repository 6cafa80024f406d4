//! End-to-end tests against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use portal_shared::AuthToken;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

use super::{ConnectionManager, WsTransport};
use crate::config::{RealtimeConfig, ReconnectConfig};
use crate::infrastructure::clock::SystemClock;
use crate::state::{ConnectionStatus, RealtimeState};

const WAIT: Duration = Duration::from_secs(5);

fn config(port: u16, max_attempts: u32) -> RealtimeConfig {
    let url = Url::parse(&format!("http://127.0.0.1:{}", port)).expect("valid url");
    let mut config = RealtimeConfig::new(url);
    config.connect_timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig {
        base_delay_ms: 10,
        max_delay_ms: 100,
        max_attempts,
    };
    config
}

fn spawn(config: &RealtimeConfig) -> ConnectionManager {
    ConnectionManager::spawn(
        config,
        Arc::new(WsTransport::new()),
        Arc::new(SystemClock::new()),
    )
    .expect("valid config")
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("client connected in time")
        .expect("accept");
    accept_async(stream).await.expect("handshake")
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("valid json");
        }
    }
}

async fn wait_until(
    manager: &ConnectionManager,
    predicate: impl FnMut(&RealtimeState) -> bool,
) -> RealtimeState {
    let mut store = manager.store();
    tokio::time::timeout(WAIT, store.wait_for(predicate))
        .await
        .expect("state reached in time")
        .expect("store alive")
}

async fn close(ws: &mut WebSocketStream<TcpStream>, code: CloseCode) {
    ws.close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
    .await
    .expect("close sent");
}

#[tokio::test]
async fn test_authenticates_routes_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let manager = spawn(&config(port, 5));

    manager.connect(Some(AuthToken::new("abc")));

    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "auth", "token": "abc"}));
    wait_until(&manager, |s| s.status() == ConnectionStatus::Connected).await;

    ws.send(Message::Text(
        json!({"type": "presence", "ref_id": "7", "online": true}).to_string(),
    ))
    .await
    .expect("send presence");
    let state = wait_until(&manager, |s| s.online_status("7").is_some()).await;
    assert!(state.is_online("7"));

    // Going away is involuntary from the client's point of view.
    close(&mut ws, CloseCode::Away).await;

    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "auth", "token": "abc"}));
    wait_until(&manager, |s| s.status() == ConnectionStatus::Connected).await;

    close(&mut ws, CloseCode::Normal).await;
    wait_until(&manager, |s| s.status() == ConnectionStatus::Disconnected).await;

    let third = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(third.is_err(), "normal close must not reconnect");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_exhausts_retries() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let manager = spawn(&config(port, 1));

    manager.connect(Some(AuthToken::new("abc")));

    let state = wait_until(&manager, |s| {
        s.error() == Some("Unable to reconnect to the messaging server after 1 attempts")
    })
    .await;
    assert_eq!(state.status(), ConnectionStatus::Error);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_client_disconnect_sends_normal_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let manager = spawn(&config(port, 5));

    manager.connect(Some(AuthToken::new("abc")));
    let mut ws = accept(&listener).await;
    next_json(&mut ws).await;
    wait_until(&manager, |s| s.status() == ConnectionStatus::Connected).await;

    manager.disconnect();

    let frame = loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("close in time")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Close(frame) = message {
            break frame;
        }
    };
    assert_eq!(frame.map(|f| f.code), Some(CloseCode::Normal));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_server_close_is_acknowledged() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let manager = spawn(&config(port, 5));

    manager.connect(Some(AuthToken::new("abc")));
    let mut ws = accept(&listener).await;
    next_json(&mut ws).await;
    wait_until(&manager, |s| s.status() == ConnectionStatus::Connected).await;

    close(&mut ws, CloseCode::Normal).await;

    let reply = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("close reply in time");
    match reply {
        Some(Ok(Message::Close(frame))) => {
            assert_eq!(frame.map(|f| f.code), Some(CloseCode::Normal));
        }
        other => panic!("Expected a close reply, got {:?}", other),
    }
    wait_until(&manager, |s| s.status() == ConnectionStatus::Disconnected).await;

    manager.shutdown().await;
}
