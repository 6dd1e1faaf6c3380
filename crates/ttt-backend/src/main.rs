//! # ttt-backend
//!
//! Tic-tac-toe session server binary: loads settings, wires logging and
//! metrics, and serves until Ctrl-C.

#![deny(unsafe_code)]

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ttt_server::config::ServerConfig;
use ttt_server::registry::Registry;
use ttt_server::server::GameServer;
use ttt_server::shutdown::DrainOutcome;
use ttt_settings::Settings;

/// Tic-tac-toe session server.
#[derive(Parser, Debug)]
#[command(name = "ttt-backend", about = "Real-time tic-tac-toe session server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.ttt/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

/// Load settings, falling back to defaults when the file is unusable.
///
/// Returns the fallback error so it can be logged once the subscriber is up.
fn load_settings(path: Option<&Path>) -> (Settings, Option<String>) {
    let loaded = match path {
        Some(path) => ttt_settings::load_settings_from_path(path),
        None => ttt_settings::load_settings(),
    };
    match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e.to_string())),
    }
}

/// Merge CLI flags over loaded settings.
fn server_config(cli: &Cli, settings: &Settings) -> ServerConfig {
    let mut config = ServerConfig::from(settings);
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (settings, fallback) = load_settings(cli.settings.as_deref());
    logging::init_subscriber(&settings.logging.level, cli.log_json || settings.logging.json)?;
    if let Some(reason) = fallback {
        tracing::warn!(reason = %reason, "failed to load settings, using defaults");
    }

    let metrics = ttt_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = server_config(&cli, &settings);
    let registry = Arc::new(Registry::new(&config));
    let server = GameServer::new(config, registry).with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        frontend_url = server.config().frontend_url.as_str(),
        "ttt-backend listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    match server.shutdown().graceful_shutdown(vec![handle], None).await {
        DrainOutcome::Drained => tracing::info!("Shutdown complete"),
        DrainOutcome::Aborted(stuck) => tracing::warn!(stuck, "Shutdown forced"),
    }
    Ok(())
}
