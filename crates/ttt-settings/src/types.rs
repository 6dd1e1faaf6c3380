//! Settings type definitions.
//!
//! Every section uses `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may contain any subset of keys and the rest fall back to
//! [`Default`].

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080, "frontendUrl": "https://ttt.example/" },
///   "session": { "cleanupGraceSecs": 120 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Listener and transport settings.
    pub server: ServerSettings,
    /// Session registry settings.
    pub session: SessionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.frontend_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.frontendUrl must not be empty".into(),
            ));
        }
        if server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) must not be shorter than the interval ({})",
                server.heartbeat_timeout_secs, server.heartbeat_interval_secs
            )));
        }
        if server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be positive".into(),
            ));
        }

        let session = &self.session;
        if session.snapshot_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session.snapshotQueueCapacity must be at least 1".into(),
            ));
        }
        if session.token_length == 0 || session.token_length > session.max_token_length {
            return Err(SettingsError::InvalidValue(format!(
                "session.tokenLength must be between 1 and {}",
                session.max_token_length
            )));
        }
        Ok(())
    }
}

/// Listener and transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Browser frontend: CORS origin and redirect target for unknown paths.
    pub frontend_url: String,
    /// Largest inbound websocket message, in bytes.
    pub max_message_size: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            frontend_url: "http://localhost:5173/".to_string(),
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 10,
            heartbeat_timeout_secs: 30,
        }
    }
}

/// Session registry settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Seconds an empty session is kept before it is removed.
    pub cleanup_grace_secs: u64,
    /// Pending snapshots buffered per player before new ones are dropped.
    pub snapshot_queue_capacity: usize,
    /// Length of generated session ids.
    pub token_length: usize,
    /// Longest session id a client may supply.
    pub max_token_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cleanup_grace_secs: 60,
            snapshot_queue_capacity: 2,
            token_length: 7,
            max_token_length: 32,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
