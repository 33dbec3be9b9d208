//! Wire codec for the broker side of the bridge.
//!
//! # Data Flow
//! ```text
//! MQTT payload (JSON object)
//!     → decode() → BridgeRequest
//!     → decode_body() → raw request bytes (encoding.rs)
//!
//! BridgeReply
//!     → encode() → MQTT payload (body always base64)
//! ```
//!
//! # Design Decisions
//! - A payload whose top-level value is not a JSON object is a decode error
//! - Body encodings are a closed set; unknown tags fail closed
//! - Replies are self-describing: the body tag travels with the body

pub mod encoding;
pub mod envelope;

use serde_json::Value;
use thiserror::Error;

pub use encoding::{BodyEncoding, EncodingError, URI_COMPONENT_TAG};
pub use envelope::{BridgeReply, BridgeRequest, INVALID_MESSAGE_BODY, REPLY_BODY_ENCODING};

/// Errors decoding an inbound envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("envelope field has the wrong type: {0}")]
    Envelope(#[source] serde_json::Error),
}

/// Decode a raw broker payload into a request envelope.
pub fn decode(raw: &[u8]) -> Result<BridgeRequest, DecodeError> {
    let value: Value = serde_json::from_slice(raw).map_err(DecodeError::Json)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject(json_kind(&value)));
    }
    serde_json::from_value(value).map_err(DecodeError::Envelope)
}

/// Encode a reply envelope into a broker payload.
pub fn encode(reply: &BridgeReply) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(reply)
}

/// Resolve `httpBody` into bytes according to `httpBodyEncodeType`.
///
/// A missing or empty tag means the body text is used as-is.
pub fn decode_body(body: &str, tag: Option<&str>) -> Result<Vec<u8>, EncodingError> {
    match tag.filter(|t| !t.is_empty()) {
        None => Ok(body.as_bytes().to_vec()),
        Some(tag) => BodyEncoding::from_tag(tag)?.decode(body),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
