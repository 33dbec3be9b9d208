//! MQTT to local HTTP bridge.
//!
//! Subscribes to a request topic, replays each message as an HTTP request
//! against a server on `127.0.0.1`, and publishes the response to the
//! message's reply topic.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                        BRIDGE                        │
//!    MQTT broker   │  ┌────────────┐   ┌──────────┐   ┌─────────────────┐ │
//!  ────────────────┼─▶│ dispatcher │──▶│  worker  │──▶│ codec + request │ │
//!   request topic  │  │ event loop │   │   pool   │   │   synthesis     │ │
//!                  │  └────────────┘   └────┬─────┘   └────────┬────────┘ │
//!                  │                        │                  ▼          │     local HTTP
//!    MQTT broker   │  ┌────────────┐   ┌────┴─────┐   ┌─────────────────┐ │     server
//!  ◀───────────────┼──│  publisher │◀──│  reply   │◀──│  local client   │◀┼──── 127.0.0.1
//!    reply topic   │  └────────────┘   │ encoder  │   └─────────────────┘ │
//!                  │                   └──────────┘                       │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use mqtt_http_bridge::config::load_config;
use mqtt_http_bridge::lifecycle::{signals, startup, Shutdown};
use mqtt_http_bridge::observability::logging;

#[derive(Parser)]
#[command(name = "mqtt-http-bridge")]
#[command(about = "Bridge MQTT request/reply messages to a local HTTP server", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.observability)?;

    tracing::info!("mqtt-http-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        endpoint = %config.broker.endpoint,
        topic = %config.broker.topic,
        local_port = config.local.port,
        workers = config.workers.count,
        "Configuration loaded"
    );

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::trigger_on_signal(&signal_shutdown).await;
    });

    if let Err(e) = startup::run(config, &shutdown).await {
        tracing::error!(error = %e, "Bridge failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
