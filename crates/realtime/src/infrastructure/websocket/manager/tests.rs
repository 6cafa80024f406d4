use std::sync::{Arc, Mutex};
use std::time::Duration;

use portal_shared::{AuthToken, ConversationType, OutboundFrame, RefId};
use serde_json::{json, Value};
use url::Url;

use super::ConnectionManager;
use crate::config::{RealtimeConfig, ReconnectConfig, NORMAL_CLOSURE};
use crate::error::ErrorKind;
use crate::infrastructure::messaging::{EventKind, RealtimeEvent};
use crate::infrastructure::testing::{FakeTransport, FixedClock};
use crate::infrastructure::websocket::ABNORMAL_CLOSURE;
use crate::state::ConnectionStatus;

const WAIT: Duration = Duration::from_secs(2);

fn config(base_delay_ms: u64, max_attempts: u32) -> RealtimeConfig {
    let mut config = RealtimeConfig::new(Url::parse("http://localhost:8000").expect("valid url"));
    config.connect_timeout = Duration::from_secs(5);
    config.reconnect = ReconnectConfig {
        base_delay_ms,
        max_delay_ms: 1_000,
        max_attempts,
    };
    config
}

fn spawn(config: &RealtimeConfig, transport: &FakeTransport) -> ConnectionManager {
    let clock = FixedClock(chrono::Utc::now());
    ConnectionManager::spawn(config, Arc::new(transport.clone()), Arc::new(clock))
        .expect("valid config")
}

fn token() -> Option<AuthToken> {
    Some(AuthToken::new("abc"))
}

async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_status(manager: &ConnectionManager, status: ConnectionStatus) {
    let mut store = manager.store();
    tokio::time::timeout(WAIT, store.wait_for(|s| s.status() == status))
        .await
        .expect("status not reached in time")
        .expect("store alive");
}

fn frames(transport: &FakeTransport, link: usize) -> Vec<Value> {
    transport
        .sent(link)
        .iter()
        .map(|text| serde_json::from_str(text).expect("valid json"))
        .collect()
}

/// Connect and drive the first link to Connected.
async fn connect(manager: &ConnectionManager, transport: &FakeTransport) {
    manager.connect(token());
    until(|| transport.open_count() == 1).await;
    transport.open_link(0);
    wait_status(manager, ConnectionStatus::Connected).await;
}

#[tokio::test]
async fn test_connect_authenticates_once_then_connected() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);

    manager.connect(token());
    wait_status(&manager, ConnectionStatus::Connecting).await;
    until(|| transport.open_count() == 1).await;

    let url = transport.url(0).expect("link recorded");
    assert_eq!(url.scheme(), "ws");
    assert_eq!(url.host_str(), Some("localhost"));
    assert_eq!(url.port(), Some(8000));
    assert!(transport.sent(0).is_empty());

    transport.open_link(0);
    wait_status(&manager, ConnectionStatus::Connected).await;

    assert_eq!(frames(&transport, 0), vec![json!({"type": "auth", "token": "abc"})]);
    assert_eq!(manager.store().error(), None);
}

#[tokio::test]
async fn test_normal_close_does_not_reconnect() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.close_link(0, NORMAL_CLOSURE);
    wait_status(&manager, ConnectionStatus::Disconnected).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_abnormal_close_reconnects_and_reauthenticates() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.close_link(0, ABNORMAL_CLOSURE);
    until(|| transport.open_count() == 2).await;
    assert_eq!(manager.status(), ConnectionStatus::Connecting);

    transport.open_link(1);
    wait_status(&manager, ConnectionStatus::Connected).await;
    assert_eq!(frames(&transport, 1), vec![json!({"type": "auth", "token": "abc"})]);
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let transport = FakeTransport::new();
    // First retry waits 2 * 50ms.
    let manager = spawn(&config(50, 5), &transport);
    connect(&manager, &transport).await;

    transport.close_link(0, ABNORMAL_CLOSURE);
    wait_status(&manager, ConnectionStatus::Disconnected).await;
    manager.disconnect();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_disconnect_closes_with_normal_code() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    manager.disconnect();
    wait_status(&manager, ConnectionStatus::Disconnected).await;
    until(|| transport.close_code(0).is_some()).await;
    assert_eq!(transport.close_code(0), Some(NORMAL_CLOSURE));
}

#[tokio::test]
async fn test_send_requires_connected() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    let frame = OutboundFrame::text(RefId::new("42"), ConversationType::Personal, "hello");

    assert!(!manager.send(&frame));

    connect(&manager, &transport).await;
    assert!(manager.send(&frame));
    until(|| transport.sent(0).len() == 2).await;

    assert_eq!(
        frames(&transport, 0)[1],
        json!({
            "type": "message",
            "ref_id": "42",
            "conversation_type": "personal",
            "text": "hello",
        })
    );
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.push_message(0, "{not json");
    transport.push_message(
        0,
        r#"{"type":"presence","ref_id":"7","online":true,"timestamp":1700000000000}"#,
    );

    let mut store = manager.store();
    let state = tokio::time::timeout(WAIT, store.wait_for(|s| s.online_status("7").is_some()))
        .await
        .expect("presence routed")
        .expect("store alive");

    assert_eq!(state.status(), ConnectionStatus::Connected);
    assert!(state.is_online("7"));
    assert_eq!(state.error(), None);
}

#[tokio::test]
async fn test_transport_error_sets_status_without_message() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.fail_link(0, "connection reset");
    wait_status(&manager, ConnectionStatus::Error).await;
    assert_eq!(manager.store().error(), None);

    transport.close_link(0, ABNORMAL_CLOSURE);
    until(|| transport.open_count() == 2).await;
}

#[tokio::test]
async fn test_inbound_messages_are_logged_per_conversation() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.push_message(0, r#"{"type":"message","id":"m1","ref_id":"42","text":"hi"}"#);
    transport.push_message(0, r#"{"type":"delivered","id":"m1","ref_id":"42"}"#);

    let ref_id = RefId::new("42");
    let mut store = manager.store();
    let state = tokio::time::timeout(WAIT, store.wait_for(|s| s.messages(&ref_id).len() == 2))
        .await
        .expect("messages routed")
        .expect("store alive");
    assert!(state.is_delivered(&ref_id, "m1"));
}

#[tokio::test]
async fn test_connect_timeout_reports_and_retries() {
    let transport = FakeTransport::new();
    let mut config = config(10, 5);
    config.connect_timeout = Duration::from_millis(30);
    let manager = spawn(&config, &transport);

    manager.connect(token());

    let mut store = manager.store();
    let state = tokio::time::timeout(WAIT, store.wait_for(|s| s.error().is_some()))
        .await
        .expect("timeout reported")
        .expect("store alive");
    assert_eq!(state.error(), Some("Connection timeout"));
    assert_eq!(transport.close_code(0), Some(NORMAL_CLOSURE));

    until(|| transport.open_count() == 2).await;
}

#[tokio::test]
async fn test_store_updated_before_subscribers_run() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = manager.store();
    let sink = Arc::clone(&seen);
    manager
        .events()
        .subscribe(move |event| {
            if let RealtimeEvent::StatusChanged(status) = event {
                sink.lock().expect("lock").push((status, observer.status()));
            }
        })
        .await;

    connect(&manager, &transport).await;
    transport.close_link(0, NORMAL_CLOSURE);
    wait_status(&manager, ConnectionStatus::Disconnected).await;
    until(|| seen.lock().expect("lock").len() == 3).await;

    let seen = seen.lock().expect("lock").clone();
    assert_eq!(
        seen.iter().map(|(event, _)| *event).collect::<Vec<_>>(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
        ]
    );
    assert!(seen.iter().all(|(event, stored)| event == stored));
}

#[tokio::test]
async fn test_missing_token_publishes_error() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    manager
        .events()
        .subscribe_to(&[EventKind::Error], move |event| match event {
            RealtimeEvent::ConnectionError { kind, message } => {
                sink.lock().expect("lock").push((kind, message))
            }
            other => panic!("Unexpected event {:?}", other),
        })
        .await;

    manager.connect(Some(AuthToken::new("   ")));
    wait_status(&manager, ConnectionStatus::Error).await;
    until(|| !errors.lock().expect("lock").is_empty()).await;

    assert_eq!(
        errors.lock().expect("lock")[0],
        (ErrorKind::MissingToken, "Authentication token is missing".to_string())
    );
    assert_eq!(
        manager.store().error().as_deref(),
        Some("Authentication token is missing")
    );
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(5, 2), &transport);

    manager.connect(token());
    for link in 0..3 {
        until(|| transport.open_count() == link + 1).await;
        transport.close_link(link, ABNORMAL_CLOSURE);
    }

    let mut store = manager.store();
    let state = tokio::time::timeout(WAIT, store.wait_for(|s| s.error().is_some()))
        .await
        .expect("exhaustion reported")
        .expect("store alive");
    assert_eq!(state.status(), ConnectionStatus::Error);
    assert_eq!(
        state.error(),
        Some("Unable to reconnect to the messaging server after 2 attempts")
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.open_count(), 3);
}

#[tokio::test]
async fn test_clear_and_mark_read_commands() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    transport.push_message(0, r#"{"type":"notification","id":"n1","title":"Invoice"}"#);
    transport.push_message(0, r#"{"type":"message","id":"m1","ref_id":"42"}"#);
    let mut store = manager.store();
    tokio::time::timeout(
        WAIT,
        store.wait_for(|s| s.unread_notifications().len() == 1 && s.conversation_ids().count() == 1),
    )
    .await
    .expect("frames routed")
    .expect("store alive");

    manager.mark_notifications_read();
    tokio::time::timeout(WAIT, store.wait_for(|s| s.unread_notifications().is_empty()))
        .await
        .expect("marked read")
        .expect("store alive");
    assert_eq!(manager.store().notifications().len(), 1);

    manager.clear_messages();
    manager.clear_notifications();
    tokio::time::timeout(
        WAIT,
        store.wait_for(|s| s.notifications().is_empty() && s.conversation_ids().count() == 0),
    )
    .await
    .expect("cleared")
    .expect("store alive");
    assert_eq!(manager.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn test_shutdown_closes_and_stops() {
    let transport = FakeTransport::new();
    let manager = spawn(&config(10, 5), &transport);
    connect(&manager, &transport).await;

    manager.shutdown().await;
    assert_eq!(transport.close_code(0), Some(NORMAL_CLOSURE));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);

    manager.connect(token());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.open_count(), 1);
}
