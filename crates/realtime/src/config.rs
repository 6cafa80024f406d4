//! Realtime connection configuration.
//!
//! Values come from the environment (optionally seeded from `.env.local` /
//! `.env`), falling back to the defaults the portal ships with.

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Close code used for explicit, voluntary closes.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Reconnect backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay unit; attempt `n` waits `base_delay_ms * 2^n`
    pub base_delay_ms: u64,
    /// Caps exponential growth
    pub max_delay_ms: u64,
    /// Automatic retries allowed before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RECONNECT_BASE_MS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_MS,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Injected configuration for a `ConnectionManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// HTTP origin of the backend; the socket endpoint is derived from it
    pub api_base_url: Url,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("PORTAL_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_base_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidUrl {
            var: "PORTAL_API_URL",
            source,
        })?;

        let connect_timeout_ms = parse_number(
            &lookup,
            "PORTAL_WS_CONNECT_TIMEOUT_MS",
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;
        let reconnect = ReconnectConfig {
            base_delay_ms: parse_number(
                &lookup,
                "PORTAL_WS_RECONNECT_BASE_MS",
                DEFAULT_RECONNECT_BASE_MS,
            )?,
            max_delay_ms: parse_number(
                &lookup,
                "PORTAL_WS_RECONNECT_MAX_MS",
                DEFAULT_RECONNECT_MAX_MS,
            )?,
            max_attempts: parse_number(
                &lookup,
                "PORTAL_WS_MAX_RECONNECT_ATTEMPTS",
                DEFAULT_MAX_RECONNECT_ATTEMPTS,
            )?,
        };

        let config = Self {
            api_base_url,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            reconnect,
        };
        // Fail at load time rather than on first connect.
        config.ws_endpoint()?;
        Ok(config)
    }

    /// WebSocket endpoint derived from the HTTP origin.
    ///
    /// `http` maps to `ws` and `https` to `wss`; path, query and fragment are
    /// dropped.
    pub fn ws_endpoint(&self) -> Result<Url, ConfigError> {
        let scheme = match self.api_base_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };
        let host = self
            .api_base_url
            .host_str()
            .ok_or_else(|| ConfigError::UnsupportedScheme(self.api_base_url.scheme().into()))?;

        let origin = match self.api_base_url.port() {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        };
        Url::parse(&origin).map_err(|source| ConfigError::InvalidUrl {
            var: "PORTAL_API_URL",
            source,
        })
    }
}

fn parse_number<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var).map(|s| s.trim().to_string()) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

/// Load `.env.local` then `.env` from `dir` when present.
///
/// Variables already set are never overridden, so local overrides win.
pub fn load_dotenv(dir: &Path) -> Result<(), ConfigError> {
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        if path.exists() {
            dotenvy::from_path(&path).map_err(|source| ConfigError::EnvFile {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    Ok(())
}
