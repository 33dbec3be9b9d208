//! Wire envelopes exchanged over the broker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::encoding::{BodyEncoding, EncodingError};

/// Encoding used for every reply body this bridge produces.
pub const REPLY_BODY_ENCODING: BodyEncoding = BodyEncoding::Base64;

/// Body of the synthetic reply sent for requests that fail validation.
pub const INVALID_MESSAGE_BODY: &str = "invalid msg data";

/// Inbound request, published by a remote caller on the request topic.
///
/// Every field is optional on the wire; acceptance rules are applied by the
/// dispatcher, not by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<HashMap<String, String>>,

    /// Topic the reply is published to. Absent means nobody is listening.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_body: Option<String>,

    /// Tag naming how `http_body` is encoded. Absent means raw text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_body_encode_type: Option<String>,
}

impl BridgeRequest {
    /// Reply topic, treating an empty string as absent.
    pub fn reply_topic(&self) -> Option<&str> {
        self.reply_topic.as_deref().filter(|t| !t.is_empty())
    }
}

/// Outbound reply, published on the request's reply topic.
///
/// Fields are private so the body can only be set through [`BridgeReply::new`],
/// which keeps `httpBodyEncodeType` and `httpBody` consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeReply {
    status_code: u16,
    http_headers: HashMap<String, String>,
    http_body_encode_type: String,
    http_body: String,
}

impl BridgeReply {
    /// Build a reply, encoding `body` with [`REPLY_BODY_ENCODING`].
    pub fn new(status_code: u16, http_headers: HashMap<String, String>, body: &[u8]) -> Self {
        // base64 represents any byte sequence
        let http_body = REPLY_BODY_ENCODING.encode(body).unwrap_or_default();
        Self {
            status_code,
            http_headers,
            http_body_encode_type: REPLY_BODY_ENCODING.tag().to_string(),
            http_body,
        }
    }

    /// The `400` reply for requests that fail validation.
    pub fn invalid_message() -> Self {
        Self::new(400, HashMap::new(), INVALID_MESSAGE_BODY.as_bytes())
    }

    /// Reply for a local call that produced no response.
    pub fn local_failure(status_code: u16, reason: &str) -> Self {
        Self::new(status_code, HashMap::new(), reason.as_bytes())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.http_headers
    }

    pub fn body_encoding_tag(&self) -> &str {
        &self.http_body_encode_type
    }

    /// Raw body text as it appears on the wire.
    pub fn encoded_body(&self) -> &str {
        &self.http_body
    }

    /// Decode the body using the tag the reply declares.
    pub fn body_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        BodyEncoding::from_tag(&self.http_body_encode_type)?.decode(&self.http_body)
    }
}
