//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ttt_settings::Settings;

/// Runtime configuration for [`GameServer`](crate::server::GameServer) and
/// the [`Registry`](crate::registry::Registry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Browser frontend URL: allowed CORS origin and fallback redirect.
    pub frontend_url: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Grace period before an empty session is removed.
    pub cleanup_grace_secs: u64,
    /// Per-player snapshot queue capacity.
    pub snapshot_queue_capacity: usize,
    /// Length of generated session ids.
    pub token_length: usize,
    /// Longest accepted client-supplied session id.
    pub max_token_length: usize,
}

impl ServerConfig {
    /// Heartbeat interval as a [`Duration`], never zero.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Cleanup grace period as a [`Duration`].
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:5173/".into(),
            heartbeat_interval_secs: 10,
            heartbeat_timeout_secs: 30,
            max_message_size: 64 * 1024,
            cleanup_grace_secs: 60,
            snapshot_queue_capacity: 2,
            token_length: 7,
            max_token_length: 32,
        }
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            frontend_url: settings.server.frontend_url.clone(),
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
            max_message_size: settings.server.max_message_size,
            cleanup_grace_secs: settings.session.cleanup_grace_secs,
            snapshot_queue_capacity: settings.session.snapshot_queue_capacity,
            token_length: settings.session.token_length,
            max_token_length: settings.session.max_token_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn duration_helpers() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.cleanup_grace(), Duration::from_secs(60));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = Settings::default();
        settings.server.port = 4000;
        settings.server.frontend_url = "https://ttt.example/".into();
        settings.session.cleanup_grace_secs = 5;
        settings.session.snapshot_queue_capacity = 8;

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.frontend_url, "https://ttt.example/");
        assert_eq!(cfg.cleanup_grace_secs, 5);
        assert_eq!(cfg.snapshot_queue_capacity, 8);
        assert_eq!(cfg.token_length, 7);
        assert_eq!(cfg.max_token_length, 32);
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"host":"10.0.0.1","port":3000,"frontend_url":"http://f/","heartbeat_interval_secs":10,"heartbeat_timeout_secs":30,"max_message_size":512,"cleanup_grace_secs":1,"snapshot_queue_capacity":2,"token_length":7,"max_token_length":32}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.host, "10.0.0.1");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.max_message_size, 512);
    }
}
