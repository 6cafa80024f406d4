//! Portal Realtime - composition root binary
//!
//! Connects to the messaging server with the access token found in the
//! environment and logs every realtime event until interrupted.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use portal_realtime::config::load_dotenv;
use portal_realtime::{
    bind_auth_lifecycle, AuthState, ConnectionManager, RealtimeConfig, RealtimeEvent, SystemClock,
    WsTransport,
};
use portal_shared::AuthToken;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    load_dotenv(&cwd).context("Failed to load env files")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_realtime=debug,portal_shared=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Portal Realtime");

    let config = RealtimeConfig::from_env().context("Invalid realtime configuration")?;
    tracing::info!("Configuration loaded");
    tracing::info!("  API: {}", config.api_base_url);
    tracing::info!("  Connect timeout: {:?}", config.connect_timeout);
    tracing::info!(
        "  Reconnect: base {}ms, max {}ms, {} attempts",
        config.reconnect.base_delay_ms,
        config.reconnect.max_delay_ms,
        config.reconnect.max_attempts
    );

    let auth = auth_state_from_env()?;

    let manager = ConnectionManager::spawn(
        &config,
        Arc::new(WsTransport::new()),
        Arc::new(SystemClock::new()),
    )
    .context("Failed to start connection manager")?;

    manager.events().subscribe(log_event).await;

    let (auth_tx, auth_rx) = watch::channel(auth);
    let binding = bind_auth_lifecycle(manager.clone(), auth_rx);

    shutdown_signal().await;

    // Treat shutdown as a sign-out so the binding runs its cleanup.
    auth_tx.send_replace(AuthState::signed_out());
    drop(auth_tx);
    if let Err(e) = binding.await {
        tracing::warn!(error = %e, "Auth binding task failed");
    }
    manager.shutdown().await;

    tracing::info!("Portal Realtime shutdown complete");
    Ok(())
}

/// `PORTAL_ACCESS_TOKEN`, with optional `PORTAL_TOKEN_EXPIRES_AT` (RFC 3339).
fn auth_state_from_env() -> anyhow::Result<AuthState> {
    let Some(token) = std::env::var("PORTAL_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
    else {
        tracing::warn!("PORTAL_ACCESS_TOKEN not set; staying signed out");
        return Ok(AuthState::signed_out());
    };

    let token = match std::env::var("PORTAL_TOKEN_EXPIRES_AT") {
        Ok(raw) => {
            let expires_at = DateTime::parse_from_rfc3339(raw.trim())
                .with_context(|| format!("Invalid PORTAL_TOKEN_EXPIRES_AT: {}", raw))?
                .with_timezone(&Utc);
            AuthToken::with_expiry(token, expires_at)
        }
        Err(_) => AuthToken::new(token),
    };
    Ok(AuthState::signed_in(token))
}

fn log_event(event: RealtimeEvent) {
    match event {
        RealtimeEvent::StatusChanged(status) => tracing::info!(?status, "Connection status"),
        RealtimeEvent::ConnectionError { kind, message } => {
            tracing::error!(?kind, %message, "Connection error")
        }
        RealtimeEvent::Frame(frame) => {
            tracing::info!(kind = frame.kind(), ref_id = ?frame.ref_id(), "Inbound frame")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
