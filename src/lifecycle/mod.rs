//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Broker connect + subscribe → Workers → Dispatcher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop intake → Drain workers → DISCONNECT → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then broker, then workers
//! - Drain is bounded: workers still running after the deadline are aborted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
