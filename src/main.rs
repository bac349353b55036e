//! Edge relay server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http server ──▶ proxy prefix? ──yes──▶ forwarder ──▶ apiBaseUrl
//!                          │                 │
//!                          │                 └──no──▶ /health, /admin/*
//!                          │
//!                    ConfigStore ◀── file / local storage backend
//!                          │            ▲
//!                          │            └── watcher (external edits)
//!                          ▼
//!                    channel client ──▶ websocketUrl (reconnect with backoff)
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_relay::config::loader::load_settings_if_present;
use edge_relay::lifecycle::startup;
use edge_relay::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "edge-relay", version, about = "Configurable HTTP relay and channel client")]
struct Args {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(short, long, default_value = "relay.toml")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loaded = load_settings_if_present(&args.settings)?;
    let from_file = loaded.is_some();
    let settings = loaded.unwrap_or_default();

    logging::init_logging(&settings.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        settings = ?args.settings,
        "edge-relay starting"
    );
    if !from_file {
        tracing::info!(path = %args.settings.display(), "Settings file not found, using defaults");
    }

    tracing::info!(
        bind_address = %settings.listener.bind_address,
        prefix = %settings.proxy.prefix,
        host = settings.store.host.as_str(),
        channel_enabled = settings.channel.enabled,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    startup::run(settings).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
