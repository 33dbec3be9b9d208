//! Bridge error types.

use std::time::Duration;

use thiserror::Error;

use crate::bridge::broker::EndpointError;

/// Errors that stop the bridge from starting.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid broker endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("failed to connect to broker: {0}")]
    Connect(#[source] rumqttc::ConnectionError),

    #[error("no CONNACK from broker within {0:?}")]
    ConnectTimeout(Duration),

    #[error("failed to subscribe to '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },

    #[error("no SUBACK from broker within {0:?}")]
    SubscribeTimeout(Duration),

    #[error("broker refused subscription to '{0}'")]
    SubscribeRejected(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Errors delivering a reply to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker client rejected publish: {0}")]
    Client(#[from] rumqttc::ClientError),
}
