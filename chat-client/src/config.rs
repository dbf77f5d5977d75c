//! Configuration loading for huddle clients.
//!
//! Configuration is loaded from a TOML file (default: `huddle.toml` in the
//! platform config directory). Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use huddle_core::ReconnectPolicy;
use huddle_types::stomp::HeartBeat;
use huddle_types::UserId;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend endpoints.
    pub server: ServerConfig,
    /// Push channel tuning.
    pub connection: ConnectionConfig,
    /// Who we are.
    pub identity: IdentityConfig,
    /// Presentation settings.
    pub display: DisplayConfig,
}

/// Backend endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL for request/response calls (default: http://localhost:8080).
    pub http_base_url: String,
    /// Push channel URL (default: ws://localhost:8080/ws).
    pub ws_url: String,
    /// Prefix for publish destinations (default: /app).
    pub app_prefix: String,
}

/// Push channel tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Fixed delay between reconnection attempts (default: 5000).
    pub reconnect_delay_ms: u64,
    /// How often we send heartbeats (default: 4000, 0 disables).
    pub heartbeat_outgoing_ms: u64,
    /// How often we expect heartbeats (default: 4000, 0 disables).
    pub heartbeat_incoming_ms: u64,
    /// Handshake timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Give up after this many retries (default: 0 = never give up).
    pub max_reconnect_attempts: u32,
}

/// Local identity.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// The local user's id.
    pub user_id: String,
    /// Bearer token sent with every request and the CONNECT frame.
    pub token: String,
}

/// Presentation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `chrono` format for optimistic timestamps (default: %H:%M).
    pub timestamp_format: String,
    /// Append sends locally when the channel is down (default: false).
    pub local_echo_when_disconnected: bool,
}

// Default value functions
fn default_http_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_app_prefix() -> String {
    huddle_core::DEFAULT_APP_PREFIX.to_string()
}

fn default_timestamp_format() -> String {
    "%H:%M".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_base_url: default_http_base_url(),
            ws_url: default_ws_url(),
            app_prefix: default_app_prefix(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5000,
            heartbeat_outgoing_ms: 4000,
            heartbeat_incoming_ms: 4000,
            connect_timeout_secs: 10,
            max_reconnect_attempts: 0,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
            local_echo_when_disconnected: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The local user.
    pub fn user_id(&self) -> UserId {
        UserId::from(self.identity.user_id.as_str())
    }
}

impl ConnectionConfig {
    /// Reconnection policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(self.reconnect_delay_ms));
        match self.max_reconnect_attempts {
            0 => policy,
            max => policy.with_max_attempts(max),
        }
    }

    /// Heartbeat intervals we advertise.
    pub fn heartbeat(&self) -> HeartBeat {
        HeartBeat::from_millis(self.heartbeat_outgoing_ms, self.heartbeat_incoming_ms)
    }

    /// Handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.server.app_prefix, "/app");
        assert_eq!(config.connection.reconnect_delay_ms, 5000);
        assert_eq!(config.connection.heartbeat_outgoing_ms, 4000);
        assert_eq!(config.connection.heartbeat_incoming_ms, 4000);
        assert_eq!(config.display.timestamp_format, "%H:%M");
        assert!(!config.display.local_echo_when_disconnected);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
http_base_url = "https://api.example.com"
ws_url = "wss://api.example.com/ws"

[connection]
reconnect_delay_ms = 250
max_reconnect_attempts = 3

[identity]
user_id = "u-1"
token = "secret"
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.http_base_url, "https://api.example.com");
        assert_eq!(config.server.ws_url, "wss://api.example.com/ws");
        assert_eq!(config.server.app_prefix, "/app");
        assert_eq!(config.connection.reconnect_delay_ms, 250);
        assert_eq!(config.user_id(), UserId::from("u-1"));
        assert_eq!(config.identity.token, "secret");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.connection.connect_timeout_secs, 10);
        assert_eq!(config.server.ws_url, "ws://localhost:8080/ws");
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let unbounded = ConnectionConfig::default().reconnect_policy();
        assert_eq!(unbounded.max_attempts, None);
        assert_eq!(unbounded.delay, Duration::from_secs(5));

        let capped = ConnectionConfig {
            max_reconnect_attempts: 2,
            ..Default::default()
        }
        .reconnect_policy();
        assert_eq!(capped.max_attempts, Some(2));
    }

    #[test]
    fn heartbeat_comes_from_connection_section() {
        let hb = ConnectionConfig::default().heartbeat();
        assert_eq!(hb.to_header(), "4000,4000");
    }

    // ===========================================
    // File Loading Tests
    // ===========================================

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[display]\ntimestamp_format = \"%H:%M:%S\"").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.display.timestamp_format, "%H:%M:%S");
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nreconnect_delay_ms = \"soon\"").unwrap();

        let result = ClientConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
