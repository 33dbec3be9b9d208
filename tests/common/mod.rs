//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;

use mqtt_http_bridge::bridge::{Publisher, PublishError};
use mqtt_http_bridge::codec::BridgeReply;

/// Start a local app on an ephemeral loopback port and return the port.
///
/// Routes:
/// - `GET /ping` → `200 pong`
/// - `/echo` (any method) → request body echoed, method in `x-echo-method`,
///   `x-custom` request header copied back, query in `x-echo-query`
/// - `GET /slow/{ms}` → sleeps, then `200 slow`
/// - `GET /status/{code}` → empty body with that status
/// - `GET /big/{len}` → `len` bytes of `a`
pub async fn start_local_app() -> u16 {
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/echo", any(echo))
        .route(
            "/slow/{ms}",
            get(|Path(ms): Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                "slow"
            }),
        )
        .route(
            "/status/{code}",
            get(|Path(code): Path<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }),
        )
        .route(
            "/big/{len}",
            get(|Path(len): Path<usize>| async move { "a".repeat(len) }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> (HeaderMap, Bytes) {
    let mut out = HeaderMap::new();
    out.insert("x-echo-method", method.as_str().parse().unwrap());
    if let Some(query) = uri.query() {
        out.insert("x-echo-query", query.parse().unwrap());
    }
    if let Some(custom) = headers.get("x-custom") {
        out.insert("x-custom", custom.clone());
    }
    (out, body)
}

/// Start a backend that accepts connections and never answers.
pub async fn start_hung_backend() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    port
}

/// Publisher that records every reply in publish order.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingPublisher {
    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// The single reply published on `topic`.
    pub fn reply(&self, topic: &str) -> BridgeReply {
        let published = self.published.lock().unwrap();
        let matching: Vec<_> = published.iter().filter(|(t, _)| t == topic).collect();
        assert_eq!(matching.len(), 1, "expected exactly one reply on {topic}");
        serde_json::from_slice(&matching[0].1).unwrap()
    }
}

impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}
