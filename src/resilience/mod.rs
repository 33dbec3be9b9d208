//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Broker connect:
//!     → timeouts.rs (bounded wait for CONNACK; expiry is fatal)
//!
//! Broker error while serving:
//!     → backoff.rs (sleep with exponential backoff + jitter, then poll again)
//!
//! Local call:
//!     → timeouts.rs (bounded call + body drain; expiry becomes a 504 reply)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - No retries of local calls: the requests are not known to be idempotent
//! - Publish failures are logged, not retried

pub mod backoff;
pub mod timeouts;
