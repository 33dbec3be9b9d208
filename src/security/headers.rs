//! Header sanitization for the loopback call.
//!
//! # Responsibilities
//! - Strip the hop-by-hop `Connection` header from inbound header maps
//!
//! # Design Decisions
//! - Every local call opens its own short-lived connection, so connection
//!   directives from the original hop never apply
//! - Nothing else is touched: names and values pass through byte-for-byte

use std::collections::HashMap;

/// The connection-control header removed before forwarding.
pub const HOP_BY_HOP_HEADER: &str = "connection";

/// Remove every header named `connection`, in any letter-casing.
pub fn sanitize(mut headers: HashMap<String, String>) -> HashMap<String, String> {
    headers.retain(|name, _| !name.eq_ignore_ascii_case(HOP_BY_HOP_HEADER));
    headers
}
