//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded bridge request:
//!     → headers.rs (strip hop-by-hop connection header)
//!     → Pass to request synthesis
//! ```
//!
//! # Design Decisions
//! - The bridge only ever calls 127.0.0.1; target host is not caller-controlled
//! - Response bodies are capped (security.max_body_size) before buffering
//! - Fail closed: unknown body encodings are rejected, never passed through

pub mod headers;

pub use headers::sanitize;
