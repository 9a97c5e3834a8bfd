//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (`ROOMCAST_*`)
//! - TOML configuration file

use anyhow::{bail, Context, Result};
use roomcast_core::HubConfig;
use roomcast_transport::ClientConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat and deadline configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Token validation.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Message and membership database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Frames buffered per client before it counts as a slow consumer.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Capacity of each hub request queue.
    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Disconnect peers silent for this long, in milliseconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Ping interval in milliseconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,

    /// Deadline for one socket write, in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Required `iss` claim, if any.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Cookie carrying the access token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Retries after a failed open at startup.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Pause before the first retry, in milliseconds. Grows by the same
    /// amount after each attempt.
    #[serde(default = "default_connect_pause")]
    pub connect_pause_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    std::env::var("ROOMCAST_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("ROOMCAST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_message_size() -> usize {
    roomcast_protocol::MAX_FRAME_SIZE
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_hub_queue_capacity() -> usize {
    1024
}

fn default_idle_timeout() -> u64 {
    60_000
}

fn default_ping_interval() -> u64 {
    54_000
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_jwt_secret() -> String {
    std::env::var("ROOMCAST_JWT_SECRET").unwrap_or_else(|_| "public_secret".to_string())
}

fn default_cookie_name() -> String {
    "access_token".to_string()
}

fn default_database_path() -> String {
    std::env::var("ROOMCAST_DATABASE_PATH").unwrap_or_else(|_| "roomcast.db".to_string())
}

fn default_connect_retries() -> u32 {
    5
}

fn default_connect_pause() -> u64 {
    5_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            hub_queue_capacity: default_hub_queue_capacity(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout(),
            ping_interval_ms: default_ping_interval(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: None,
            cookie_name: default_cookie_name(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            connect_retries: default_connect_retries(),
            connect_pause_ms: default_connect_pause(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// `ROOMCAST_CONFIG` names an explicit file; otherwise the usual
    /// locations are tried in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be parsed or the result is
    /// invalid.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("ROOMCAST_CONFIG") {
            return Self::from_file(shellexpand::tilde(&path).as_ref());
        }

        let config_paths = [
            "roomcast.toml",
            "/etc/roomcast/roomcast.toml",
            "~/.config/roomcast/roomcast.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check values that would break the relay at runtime.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let heartbeat = &self.heartbeat;
        if heartbeat.idle_timeout_ms == 0 || heartbeat.write_timeout_ms == 0 {
            bail!("heartbeat timeouts must be positive");
        }
        if heartbeat.ping_interval_ms == 0 || heartbeat.ping_interval_ms >= heartbeat.idle_timeout_ms {
            bail!(
                "ping interval ({} ms) must be positive and shorter than the idle timeout ({} ms)",
                heartbeat.ping_interval_ms,
                heartbeat.idle_timeout_ms
            );
        }
        if self.limits.max_message_size == 0 {
            bail!("max_message_size must be positive");
        }
        if self.limits.outbound_queue_capacity == 0 || self.limits.hub_queue_capacity == 0 {
            bail!("queue capacities must be positive");
        }
        if !self.transport.websocket_path.starts_with('/') {
            bail!(
                "websocket_path must start with '/': {}",
                self.transport.websocket_path
            );
        }
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Per-connection settings for the transport.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            idle_timeout: Duration::from_millis(self.heartbeat.idle_timeout_ms),
            ping_interval: Duration::from_millis(self.heartbeat.ping_interval_ms),
            write_timeout: Duration::from_millis(self.heartbeat.write_timeout_ms),
            max_message_size: self.limits.max_message_size,
            outbound_capacity: self.limits.outbound_queue_capacity,
        }
    }

    /// Hub queue settings.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            queue_capacity: self.limits.hub_queue_capacity,
        }
    }
}
