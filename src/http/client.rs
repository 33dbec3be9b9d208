//! Loopback HTTP client.
//!
//! # Responsibilities
//! - Send a synthesized request to 127.0.0.1 on the configured port
//! - Drain the response body under the same deadline as the call
//! - Classify failures so the dispatcher can pick a reply status

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::StatusCode;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::BridgeConfig;
use crate::http::request::LocalRequest;
use crate::http::response::{self, LocalResponse};
use crate::observability::metrics;
use crate::resilience::timeouts::within;

/// Errors calling the local server. None of them carries a response.
#[derive(Debug, Error)]
pub enum LocalCallError {
    #[error("failed to build local request: {0}")]
    Build(#[source] axum::http::Error),

    #[error("local request failed: {0}")]
    Request(#[source] hyper_util::client::legacy::Error),

    #[error("failed to read local response body: {0}")]
    Body(#[source] axum::Error),

    #[error("local call exceeded {0:?}")]
    Timeout(Duration),
}

impl LocalCallError {
    /// Status reported to the caller in place of a real response.
    pub fn status(&self) -> StatusCode {
        match self {
            LocalCallError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Body text reported to the caller.
    pub fn reason(&self) -> &'static str {
        match self {
            LocalCallError::Timeout(_) => "local call timed out",
            _ => "local call failed",
        }
    }
}

/// Client for the local server the bridge fronts.
#[derive(Clone)]
pub struct LocalClient {
    client: Client<HttpConnector, Body>,
    port: u16,
    timeout: Duration,
    max_body_size: usize,
}

impl LocalClient {
    /// Create a client for `127.0.0.1:<port>`.
    pub fn new(port: u16, timeout: Duration, max_body_size: usize) -> Self {
        // No pooling: every call gets a fresh connection.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Self {
            client,
            port,
            timeout,
            max_body_size,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.local.port,
            Duration::from_secs(config.timeouts.local_call_secs),
            config.security.max_body_size,
        )
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send `request` and buffer the whole response.
    pub async fn call(&self, request: LocalRequest) -> Result<LocalResponse, LocalCallError> {
        let start_time = Instant::now();
        let method = request.method.clone();
        let http_request = request.into_http(self.port).map_err(LocalCallError::Build)?;

        let result = within(self.timeout, async {
            let response = self
                .client
                .request(http_request)
                .await
                .map_err(LocalCallError::Request)?;
            response::buffer(response, self.max_body_size)
                .await
                .map_err(LocalCallError::Body)
        })
        .await
        .unwrap_or(Err(LocalCallError::Timeout(self.timeout)));

        let status = match &result {
            Ok(response) => response.status,
            Err(e) => e.status(),
        };
        metrics::record_local_call(method.as_str(), status.as_u16(), start_time);

        result
    }
}
