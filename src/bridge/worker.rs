//! Per-message processing and the worker pool that runs it.
//!
//! # Per-message state machine
//! ```text
//! payload ─▶ Validating ─┬─ empty / undecodable / no reply topic ─▶ dropped
//!                        ├─ invalid (reply topic known) ──────────▶ 400 reply
//!                        └─ valid ─▶ Forwarding ─┬─▶ Replying (reply topic)
//!                                                └─▶ LoggingOnly (fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - Workers share one bounded queue; a slow local call occupies one worker only
//! - Every failure is handled inside the worker, nothing propagates to the
//!   dispatcher
//! - Local call failures become 502/504 replies

use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{field, Instrument};
use uuid::Uuid;

use crate::bridge::broker::Publisher;
use crate::bridge::error::PublishError;
use crate::codec::{self, BridgeReply, BridgeRequest};
use crate::http::response::{self, LocalResponse};
use crate::http::{synthesize, LocalCallError, LocalClient};
use crate::observability::metrics;

/// Longest payload excerpt written to logs for undecodable messages.
const LOGGED_PAYLOAD_LIMIT: usize = 256;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Zero-length payload.
    Empty,
    /// Payload was not a JSON object envelope.
    Undecodable,
    /// Request named no reply topic and was not forwarded.
    Dropped,
    /// Request failed validation; a 400 was sent if a reply topic was known.
    Rejected,
    /// Local server answered with this status.
    Forwarded(u16),
    /// Local call produced no response; this status was reported instead.
    LocalFailure(u16),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::Undecodable => "undecodable",
            Outcome::Dropped => "dropped",
            Outcome::Rejected => "rejected",
            Outcome::Forwarded(_) => "forwarded",
            Outcome::LocalFailure(_) => "local_failure",
        }
    }
}

/// Turns inbound payloads into local calls and replies.
pub struct MessageHandler<P> {
    publisher: P,
    client: LocalClient,
    fire_and_forget: bool,
}

impl<P: Publisher> MessageHandler<P> {
    pub fn new(publisher: P, client: LocalClient, fire_and_forget: bool) -> Self {
        Self {
            publisher,
            client,
            fire_and_forget,
        }
    }

    /// Process one raw payload from the request topic.
    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        let span = tracing::info_span!(
            "message",
            message_id = %Uuid::new_v4(),
            reply_topic = field::Empty,
            method = field::Empty,
            path = field::Empty,
        );
        let outcome = self.process(payload).instrument(span).await;
        metrics::record_message(outcome.as_str());
        outcome
    }

    async fn process(&self, payload: &[u8]) -> Outcome {
        if payload.is_empty() {
            return Outcome::Empty;
        }

        let request = match codec::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                let excerpt = &payload[..payload.len().min(LOGGED_PAYLOAD_LIMIT)];
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(excerpt),
                    "Invalid bridge message"
                );
                return Outcome::Undecodable;
            }
        };

        let reply_topic = request.reply_topic().map(str::to_owned);
        if let Some(topic) = &reply_topic {
            tracing::Span::current().record("reply_topic", topic.as_str());
        }

        match (&reply_topic, request.http_headers.is_some()) {
            (Some(topic), false) => {
                tracing::warn!("Bridge message has no httpHeaders");
                self.reply(topic, &BridgeReply::invalid_message()).await;
                return Outcome::Rejected;
            }
            (None, has_headers) if !(has_headers && self.fire_and_forget) => {
                tracing::debug!(has_headers, "Bridge message has no reply topic, dropping");
                return Outcome::Dropped;
            }
            _ => {}
        }

        self.forward(request, reply_topic.as_deref()).await
    }

    async fn forward(&self, request: BridgeRequest, reply_topic: Option<&str>) -> Outcome {
        let local_request = match synthesize(request) {
            Ok(local_request) => local_request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting bridge message");
                if let Some(topic) = reply_topic {
                    self.reply(topic, &BridgeReply::invalid_message()).await;
                }
                return Outcome::Rejected;
            }
        };

        let span = tracing::Span::current();
        span.record("method", local_request.method.as_str());
        span.record("path", local_request.path.as_str());

        let result = self.client.call(local_request).await;

        match reply_topic {
            None => log_unreplied(&result),
            Some(topic) => {
                let reply = match &result {
                    Ok(local) => response::build(local),
                    Err(e) => {
                        tracing::error!(error = %e, "Local call failed");
                        BridgeReply::local_failure(e.status().as_u16(), e.reason())
                    }
                };
                self.reply(topic, &reply).await;
            }
        }

        match result {
            Ok(local) => Outcome::Forwarded(local.status.as_u16()),
            Err(e) => Outcome::LocalFailure(e.status().as_u16()),
        }
    }

    /// Hand `reply` to the broker client; failures are logged and counted,
    /// never retried. Delivery errors surface later on the event loop.
    async fn reply(&self, topic: &str, reply: &BridgeReply) {
        match self.try_reply(topic, reply).await {
            Ok(()) => {
                metrics::record_reply_published();
                tracing::debug!(topic = %topic, status = reply.status_code(), "Reply queued for broker");
            }
            Err(e) => {
                metrics::record_publish_failure();
                tracing::error!(topic = %topic, error = %e, "Failed to publish reply");
            }
        }
    }

    async fn try_reply(&self, topic: &str, reply: &BridgeReply) -> Result<(), PublishError> {
        let payload = codec::encode(reply)?;
        self.publisher.publish(topic, payload).await
    }
}

fn log_unreplied(result: &Result<LocalResponse, LocalCallError>) {
    match result {
        Ok(response) if response.status != StatusCode::OK => {
            tracing::warn!(status = %response.status, "Local call returned non-200 status");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Local call failed"),
    }
}

/// Errors handing a payload to the worker pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("worker queue is full")]
    Full,

    #[error("worker pool is closed")]
    Closed,
}

/// Fixed set of workers draining one bounded queue.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Bytes>>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `count` workers behind a queue of `capacity` payloads.
    pub fn spawn<P: Publisher>(handler: Arc<MessageHandler<P>>, count: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = JoinSet::new();
        for id in 0..count {
            workers.spawn(worker_loop(id, handler.clone(), receiver.clone()));
        }

        tracing::info!(workers = count, queue_capacity = capacity, "Worker pool started");
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Queue a payload without waiting.
    pub fn try_submit(&self, payload: Bytes) -> Result<(), SubmitError> {
        let sender = self.sender.as_ref().ok_or(SubmitError::Closed)?;
        sender.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Stop accepting payloads; queued ones are still processed.
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Close the queue and wait for every worker to finish.
    pub async fn join(mut self) {
        self.close();
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
    }
}

async fn worker_loop<P: Publisher>(
    id: usize,
    handler: Arc<MessageHandler<P>>,
    queue: Arc<Mutex<mpsc::Receiver<Bytes>>>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(payload) = next else { break };
        handler.handle(&payload).await;
    }
    tracing::debug!(worker = id, "Worker exiting");
}
