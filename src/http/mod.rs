//! HTTP side of the bridge.
//!
//! # Data Flow
//! ```text
//! BridgeRequest
//!     → request.rs (defaults, body decoding, header sanitization)
//!     → client.rs (loopback call to 127.0.0.1:<port>, bounded)
//!     → response.rs (buffer body, flatten headers)
//!     → BridgeReply
//! ```

pub mod client;
pub mod request;
pub mod response;

pub use client::{LocalCallError, LocalClient};
pub use request::{synthesize, LocalRequest, SynthesisError};
pub use response::LocalResponse;
