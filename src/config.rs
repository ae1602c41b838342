//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::HubConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Base URL of the instance-management API.
    pub evolution_api_url: String,

    /// Value of the `apikey` header sent to the instance API.
    pub evolution_api_key: String,

    /// Request timeout for calls to the instance API.
    pub evolution_api_timeout: Duration,

    /// Connection registry settings.
    pub hub: HubConfig,

    /// Log output format.
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let evolution_api_url = std::env::var("EVOLUTION_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let evolution_api_key = std::env::var("EVOLUTION_API_KEY").unwrap_or_default();
        let evolution_api_timeout =
            Duration::from_secs(parse_env("EVOLUTION_API_TIMEOUT_SECS", 30));

        let defaults = HubConfig::default();
        let hub = HubConfig {
            queue_capacity: parse_env("HUB_QUEUE_CAPACITY", defaults.queue_capacity),
            command_capacity: parse_env("HUB_COMMAND_CAPACITY", defaults.command_capacity),
            channel_send_timeout: std::env::var("HUB_CHANNEL_SEND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.channel_send_timeout),
        };

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            listen_addr,
            evolution_api_url,
            evolution_api_key,
            evolution_api_timeout,
            hub,
            log_format,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
