//! MQTT to local HTTP request/reply bridge.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use bridge::{BridgeError, Dispatcher};
pub use config::BridgeConfig;
pub use lifecycle::Shutdown;
