//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, workers and local client produce:
//!     → logging.rs (structured log events, one span per message)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - A generated message ID flows through every log line of one message
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
