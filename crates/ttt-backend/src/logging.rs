//! Tracing subscriber setup.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
///
/// An unparsable `level` falls back to `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, plain text or one JSON object per line.
pub fn init_subscriber(level: &str, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(level));
    let installed = if json {
        builder.json().with_target(true).try_init()
    } else {
        builder.with_target(false).try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
