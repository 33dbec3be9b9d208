//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, QoS levels)
//! - Check the broker endpoint and request topic are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::bridge::broker::BrokerEndpoint;
use crate::config::schema::{BridgeConfig, MQTT_MAX_PACKET_SIZE};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = BrokerEndpoint::parse(&config.broker.endpoint) {
        errors.push(ValidationError::new("broker.endpoint", e.to_string()));
    }

    let topic = &config.broker.topic;
    if topic.is_empty() {
        errors.push(ValidationError::new("broker.topic", "must not be empty"));
    } else if topic.contains(['+', '#']) {
        errors.push(ValidationError::new(
            "broker.topic",
            "wildcards are not allowed; the bridge serves exactly one topic",
        ));
    }

    if config.broker.qos > 2 {
        errors.push(ValidationError::new(
            "broker.qos",
            format!("{} is not a valid QoS level", config.broker.qos),
        ));
    }
    if config.broker.keep_alive_secs < 5 {
        errors.push(ValidationError::new("broker.keep_alive_secs", "must be at least 5"));
    }
    if config.broker.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("broker.connect_timeout_secs", "must be greater than 0"));
    }
    if config.broker.channel_capacity == 0 {
        errors.push(ValidationError::new("broker.channel_capacity", "must be greater than 0"));
    }

    let max_packet = config.broker.max_packet_size;
    if max_packet == 0 || max_packet > MQTT_MAX_PACKET_SIZE {
        errors.push(ValidationError::new(
            "broker.max_packet_size",
            format!("must be between 1 and {}", MQTT_MAX_PACKET_SIZE),
        ));
    } else if max_packet < base64_len(config.security.max_body_size) {
        errors.push(ValidationError::new(
            "broker.max_packet_size",
            format!(
                "{} cannot carry a base64 reply of security.max_body_size ({} bytes)",
                max_packet, config.security.max_body_size
            ),
        ));
    }

    if config.local.port == 0 {
        errors.push(ValidationError::new("local.port", "must be greater than 0"));
    }

    if config.workers.count == 0 {
        errors.push(ValidationError::new("workers.count", "must be greater than 0"));
    }
    if config.workers.queue_capacity == 0 {
        errors.push(ValidationError::new("workers.queue_capacity", "must be greater than 0"));
    }

    if config.timeouts.local_call_secs == 0 {
        errors.push(ValidationError::new("timeouts.local_call_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Length of `len` bytes once base64-encoded with padding.
fn base64_len(len: usize) -> usize {
    len.div_ceil(3).saturating_mul(4)
}
