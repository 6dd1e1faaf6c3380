//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants shared by every recording site.

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ttt_ws_connections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ttt_ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ttt_ws_connection_duration_seconds";
/// Live sessions in the registry (gauge).
pub const SESSIONS_ACTIVE: &str = "ttt_sessions_active";
/// Sessions created (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "ttt_sessions_created_total";
/// Sessions removed (counter).
pub const SESSIONS_REMOVED_TOTAL: &str = "ttt_sessions_removed_total";
/// Commands received (counter, labels: kind).
pub const COMMANDS_TOTAL: &str = "ttt_commands_total";
/// Commands refused (counter, labels: code).
pub const COMMAND_ERRORS_TOTAL: &str = "ttt_command_errors_total";
/// Snapshots dropped because a player's queue was full (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "ttt_broadcast_drops_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        // Local recorder: a global install would leak into other tests.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(SESSIONS_CREATED_TOTAL).increment(3);
        });
        assert!(handle.render().contains("ttt_sessions_created_total 3"));
    }

    #[test]
    fn metric_names_are_prefixed_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            SESSIONS_ACTIVE,
            SESSIONS_CREATED_TOTAL,
            SESSIONS_REMOVED_TOTAL,
            COMMANDS_TOTAL,
            COMMAND_ERRORS_TOTAL,
            BROADCAST_DROPS_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("ttt_"), "metric '{name}' must be prefixed");
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
