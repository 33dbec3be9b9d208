//! MQTT side of the bridge.
//!
//! # Data Flow
//! ```text
//! Broker ─▶ dispatcher.rs (event loop, subscription, intake)
//!              │ try_submit
//!              ▼
//!           worker.rs (bounded queue, N workers)
//!              │ decode → synthesize → local call → reply
//!              ▼
//!           broker.rs (Publisher) ─▶ Broker (reply topic)
//! ```

pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod worker;

pub use broker::{BrokerEndpoint, MqttPublisher, Publisher};
pub use dispatcher::{ConnectionState, Dispatcher};
pub use error::{BridgeError, PublishError};
pub use worker::{MessageHandler, Outcome, WorkerPool};
