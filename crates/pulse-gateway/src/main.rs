//! Pulse gateway binary: loads settings, wires the realtime core to the
//! websocket server, and serves until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_server::PulseServer;
use pulse_settings::PulseSettings;

/// Pulse realtime activity gateway.
#[derive(Parser, Debug)]
#[command(name = "pulse-gateway", about = "Realtime activity gateway")]
struct Cli {
    /// Settings file (defaults to `~/.pulse/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Default log filter (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, settings: &mut PulseSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(pulse_settings::settings_path);
    let mut settings = pulse_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    pulse_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    let metrics = pulse_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    if settings.auth.tokens.is_empty() {
        tracing::warn!("no auth tokens configured; every websocket upgrade will be refused");
    }

    let server = PulseServer::from_settings(&settings).with_metrics(metrics);
    let sweep = server.hub().spawn_stale_sweep(server.shutdown().token());
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Pulse gateway listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let handles = std::iter::once(handle).chain(sweep).collect();
    server.shutdown_gracefully(handles).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
