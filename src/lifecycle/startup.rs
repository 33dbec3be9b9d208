//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Connect to the broker and subscribe
//! - Start the worker pool, then hand control to the dispatcher
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Workers start only after the subscription is confirmed

use std::net::SocketAddr;
use std::sync::Arc;

use crate::bridge::{BridgeError, Dispatcher, MessageHandler, WorkerPool};
use crate::config::BridgeConfig;
use crate::http::LocalClient;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// Run the bridge until `shutdown` is triggered.
pub async fn run(config: BridgeConfig, shutdown: &Shutdown) -> Result<(), BridgeError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| BridgeError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let dispatcher = Dispatcher::connect(&config).await?;

    let client = LocalClient::from_config(&config);
    tracing::info!(port = client.port(), "Forwarding to local server");

    let handler = MessageHandler::new(
        dispatcher.publisher(),
        client,
        config.dispatch.fire_and_forget,
    );
    let pool = WorkerPool::spawn(
        Arc::new(handler),
        config.workers.count,
        config.workers.queue_capacity,
    );

    dispatcher.run(pool, shutdown.subscribe()).await;
    Ok(())
}
