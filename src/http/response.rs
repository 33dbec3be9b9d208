//! Reply encoding.
//!
//! # Responsibilities
//! - Drain the local response body into memory (bounded)
//! - Flatten response headers into a name → value map
//! - Encode status, headers and body into a [`BridgeReply`]
//!
//! # Design Decisions
//! - Bodies are buffered, never streamed onward: the reply is one message
//! - Last value wins for repeated header names
//! - Non-UTF-8 header values are converted lossily

use std::collections::HashMap;

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::BoxError;
use bytes::Bytes;

use crate::codec::BridgeReply;

/// A fully buffered response from the local server.
#[derive(Debug, Clone)]
pub struct LocalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Drain `response` into a [`LocalResponse`], failing if the body exceeds
/// `limit` bytes or the stream errors.
pub async fn buffer<B>(response: Response<B>, limit: usize) -> Result<LocalResponse, axum::Error>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    let body = axum::body::to_bytes(Body::new(body), limit).await?;
    Ok(LocalResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// Flatten a header map; for repeated names the last value wins.
pub fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat = HashMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        flat.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    flat
}

/// Build the reply for a buffered local response.
pub fn build(response: &LocalResponse) -> BridgeReply {
    BridgeReply::new(
        response.status.as_u16(),
        collect_headers(&response.headers),
        &response.body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_last_header_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let flat = collect_headers(&headers);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["set-cookie"], "b=2");
        assert_eq!(flat["content-type"], "text/plain");
    }

    #[test]
    fn test_non_utf8_header_value_is_lossy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-raw", HeaderValue::from_bytes(b"caf\xe9").unwrap());
        assert_eq!(collect_headers(&headers)["x-raw"], "caf\u{FFFD}");
    }

    #[test]
    fn test_build_encodes_body_as_base64() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let reply = build(&LocalResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"pong"),
        });

        assert_eq!(reply.status_code(), 200);
        assert_eq!(reply.body_encoding_tag(), "base64");
        assert_eq!(reply.encoded_body(), "cG9uZw==");
        assert_eq!(reply.headers()["content-type"], "text/plain");
    }

    #[tokio::test]
    async fn test_buffer_drains_body() {
        let response = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-id", "7")
            .body(Body::from("created"))
            .unwrap();
        let local = buffer(response, 1024).await.unwrap();
        assert_eq!(local.status, StatusCode::CREATED);
        assert_eq!(local.headers["x-id"], "7");
        assert_eq!(&local.body[..], b"created");
    }

    #[tokio::test]
    async fn test_buffer_enforces_limit() {
        let response = Response::new(Body::from(vec![0u8; 64]));
        assert!(buffer(response, 16).await.is_err());
    }
}
