//! Request synthesis.
//!
//! # Responsibilities
//! - Turn a decoded [`BridgeRequest`] into a concrete local HTTP request
//! - Apply method/path defaults and body-encoding rules
//! - Sanitize headers before they reach the loopback call
//!
//! # Design Decisions
//! - The target host is fixed to 127.0.0.1; only the port is configurable
//! - Anything that cannot be expressed as HTTP is a synthesis error, which
//!   the dispatcher turns into a `400` reply

use std::net::Ipv4Addr;

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use bytes::Bytes;
use thiserror::Error;

use crate::codec::{self, BridgeRequest, EncodingError};
use crate::security::headers::sanitize;

/// The only host the bridge ever calls.
pub const LOCAL_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Errors turning an envelope into an HTTP request.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("request carries no httpHeaders")]
    MissingHeaders,

    #[error("invalid HTTP method '{0}'")]
    Method(String),

    #[error("invalid HTTP path '{0}'")]
    Path(String),

    #[error("invalid header '{0}'")]
    Header(String),

    #[error(transparent)]
    Body(#[from] EncodingError),
}

/// A request ready to be sent to the local server.
#[derive(Debug, Clone)]
pub struct LocalRequest {
    pub method: Method,
    pub path: PathAndQuery,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl LocalRequest {
    /// Absolute URI of this request on the local server.
    pub fn uri(&self, port: u16) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(format!("{}:{}", LOCAL_HOST, port))
            .path_and_query(self.path.clone())
            .build()
    }

    /// Convert into a `Request` aimed at `127.0.0.1:<port>`.
    pub fn into_http(self, port: u16) -> Result<Request<Body>, axum::http::Error> {
        let uri = self.uri(port)?;
        let mut builder = Request::builder().method(self.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder.body(self.body.map(Body::from).unwrap_or_else(Body::empty))
    }
}

/// Build the local request for an envelope.
///
/// Rules, in order: method defaults to `POST` and is upper-cased; path
/// defaults to `/`; the body is decoded per `httpBodyEncodeType` (raw when
/// absent); headers are sanitized.
pub fn synthesize(request: BridgeRequest) -> Result<LocalRequest, SynthesisError> {
    let BridgeRequest {
        http_headers,
        http_path,
        http_method,
        http_body,
        http_body_encode_type,
        ..
    } = request;

    let headers = http_headers.ok_or(SynthesisError::MissingHeaders)?;

    let method = synthesize_method(http_method.as_deref())?;
    let path = synthesize_path(http_path.as_deref())?;

    let body = match http_body {
        Some(text) => Some(Bytes::from(codec::decode_body(
            &text,
            http_body_encode_type.as_deref(),
        )?)),
        None => None,
    };

    let mut header_map = HeaderMap::with_capacity(headers.len());
    for (name, value) in sanitize(headers) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SynthesisError::Header(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| SynthesisError::Header(name.clone()))?;
        header_map.append(header_name, header_value);
    }

    Ok(LocalRequest {
        method,
        path,
        headers: header_map,
        body,
    })
}

fn synthesize_method(method: Option<&str>) -> Result<Method, SynthesisError> {
    match method.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(Method::POST),
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| SynthesisError::Method(m.to_string())),
    }
}

fn synthesize_path(path: Option<&str>) -> Result<PathAndQuery, SynthesisError> {
    let path = match path.filter(|p| !p.is_empty()) {
        None => return Ok(PathAndQuery::from_static("/")),
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) => format!("/{}", p),
    };
    PathAndQuery::try_from(path.as_str()).map_err(|_| SynthesisError::Path(path))
}
