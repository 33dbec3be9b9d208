//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Topic the bridge subscribes to when nothing else is configured.
pub const DEFAULT_REQUEST_TOPIC: &str = "MQ_ON_HTTTP_REQUEST";

/// Largest packet MQTT 3.1.1 can frame (remaining length of 256 MB - 1).
pub const MQTT_MAX_PACKET_SIZE: usize = 268_435_455;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Broker connection and subscription.
    pub broker: BrokerConfig,

    /// Local HTTP server the bridge fronts.
    pub local: LocalServerConfig,

    /// Per-message dispatch behavior.
    pub dispatch: DispatchConfig,

    /// Worker pool sizing.
    pub workers: WorkerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker URL (e.g., "mqtt://broker.local:1883").
    pub endpoint: String,

    /// Topic carrying inbound bridge requests.
    pub topic: String,

    /// MQTT client identifier. Empty means generate one at startup.
    pub client_id: String,

    /// QoS used for the subscription and for published replies (0, 1 or 2).
    pub qos: u8,

    /// MQTT keep-alive interval in seconds.
    pub keep_alive_secs: u64,

    /// Deadline for the initial CONNACK in seconds.
    pub connect_timeout_secs: u64,

    /// Capacity of the client's outgoing request channel.
    pub channel_capacity: usize,

    /// Largest MQTT packet accepted or sent, in bytes. Bounds both inbound
    /// envelopes and published replies.
    pub max_packet_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: "mqtt://test.mosquitto.org".to_string(),
            topic: DEFAULT_REQUEST_TOPIC.to_string(),
            client_id: String::new(),
            qos: 0,
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            channel_capacity: 64,
            max_packet_size: MQTT_MAX_PACKET_SIZE,
        }
    }
}

/// Local HTTP server configuration.
///
/// There is no host setting: the bridge only ever calls `127.0.0.1`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalServerConfig {
    /// Port the local server listens on.
    pub port: u16,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Forward requests that name no reply topic and only log non-200 results.
    pub fire_and_forget: bool,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker tasks draining the inbound queue.
    pub count: usize,

    /// Inbound queue capacity (backpressure). Messages beyond it are dropped.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 16,
            queue_capacity: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for one local call, including draining the response body.
    pub local_call_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { local_call_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum local response body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}
