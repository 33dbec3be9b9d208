//! Broker event loop driver.
//!
//! # Responsibilities
//! - Subscribe to the request topic once connected
//! - Hand every inbound payload to the worker pool without waiting
//! - Re-subscribe after each reconnect, backing off between broker errors
//! - On shutdown, drain the workers and disconnect cleanly
//!
//! # Design Decisions
//! - This task is the only one polling the event loop; workers publish
//!   through cloned client handles
//! - A full worker queue sheds the message instead of blocking the loop

use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    AsyncClient, Event, EventLoop, Outgoing, Packet, QoS, SubAck, SubscribeReasonCode,
};

use crate::bridge::broker::{self, qos_level, MqttPublisher};
use crate::bridge::error::BridgeError;
use crate::bridge::worker::{SubmitError, WorkerPool};
use crate::config::BridgeConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::backoff::reconnect_delay;
use crate::resilience::timeouts::within;

/// Extra time granted to workers on shutdown beyond one local call deadline.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the DISCONNECT packet to leave.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between event loop polls that fail while draining.
const DRAIN_ERROR_PAUSE: Duration = Duration::from_millis(200);

/// Broker connection state as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

pub struct Dispatcher {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
    state: ConnectionState,
    drain_timeout: Duration,
    /// Payloads that arrived before the first SUBACK.
    early: Vec<Bytes>,
}

impl Dispatcher {
    /// Connect, subscribe to the request topic and wait for the SUBACK.
    ///
    /// Every failure here is fatal to startup.
    pub async fn connect(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let (client, eventloop) = broker::connect(&config.broker).await?;
        let mut dispatcher = Self::from_parts(client, eventloop, config);

        let topic = dispatcher.topic.clone();
        dispatcher
            .client
            .subscribe(&topic, dispatcher.qos)
            .await
            .map_err(|source| BridgeError::Subscribe {
                topic: topic.clone(),
                source,
            })?;

        let limit = Duration::from_secs(config.broker.connect_timeout_secs);
        within(limit, dispatcher.wait_for_suback())
            .await
            .map_err(|_| BridgeError::SubscribeTimeout(limit))??;

        tracing::info!(topic = %topic, qos = ?dispatcher.qos, "Subscribed to request topic");
        Ok(dispatcher)
    }

    fn from_parts(client: AsyncClient, eventloop: EventLoop, config: &BridgeConfig) -> Self {
        Self {
            client,
            eventloop,
            topic: config.broker.topic.clone(),
            qos: qos_level(config.broker.qos),
            state: ConnectionState::Connecting,
            drain_timeout: Duration::from_secs(config.timeouts.local_call_secs) + DRAIN_GRACE,
            early: Vec::new(),
        }
    }

    async fn wait_for_suback(&mut self) -> Result<(), BridgeError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if !suback_accepted(&ack) {
                        return Err(BridgeError::SubscribeRejected(self.topic.clone()));
                    }
                    self.state = ConnectionState::Subscribed;
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == self.topic => {
                    self.early.push(publish.payload);
                }
                Ok(_) => continue,
                Err(e) => return Err(BridgeError::Connect(e)),
            }
        }
    }

    /// Publisher sharing this dispatcher's connection.
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher::new(self.client.clone(), self.qos)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the event loop until `shutdown` fires, then drain and disconnect.
    pub async fn run(mut self, pool: WorkerPool, mut shutdown: ShutdownSignal) {
        for payload in std::mem::take(&mut self.early) {
            self.submit(&pool, payload);
        }

        let mut attempt: u32 = 0;
        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(event) => {
                    if matches!(event, Event::Incoming(Packet::ConnAck(_))) {
                        attempt = 0;
                    }
                    self.on_event(event, &pool);
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    let delay = reconnect_delay(attempt);
                    self.state = ConnectionState::Disconnected;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Broker connection lost, retrying"
                    );
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("Dispatcher stopping intake");
        self.drain(pool).await;
        self.disconnect().await;
        tracing::info!("Dispatcher stopped");
    }

    fn on_event(&mut self, event: Event, pool: &WorkerPool) {
        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                if publish.topic == self.topic {
                    self.submit(pool, publish.payload);
                } else {
                    tracing::debug!(topic = %publish.topic, "Ignoring message on unexpected topic");
                }
            }
            Event::Incoming(Packet::ConnAck(_)) => {
                self.state = ConnectionState::Connecting;
                tracing::info!(topic = %self.topic, "Reconnected to broker, resubscribing");
                if let Err(e) = self.client.try_subscribe(&self.topic, self.qos) {
                    tracing::error!(topic = %self.topic, error = %e, "Failed to queue resubscribe");
                }
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                if suback_accepted(&ack) {
                    self.state = ConnectionState::Subscribed;
                    tracing::debug!(topic = %self.topic, "Subscription confirmed");
                } else {
                    tracing::error!(topic = %self.topic, "Broker refused subscription");
                }
            }
            _ => {}
        }
    }

    fn submit(&self, pool: &WorkerPool, payload: Bytes) {
        match pool.try_submit(payload) {
            Ok(()) => {}
            Err(SubmitError::Full) => {
                metrics::record_queue_dropped();
                tracing::warn!("Worker queue full, dropping message");
            }
            Err(SubmitError::Closed) => {
                tracing::warn!("Worker pool closed, dropping message");
            }
        }
    }

    /// Wait for queued and in-flight messages while still flushing their
    /// replies through the event loop.
    async fn drain(&mut self, mut pool: WorkerPool) {
        pool.close();
        let join = pool.join();
        tokio::pin!(join);
        let deadline = tokio::time::sleep(self.drain_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut join => {
                    tracing::info!("Workers drained");
                    return;
                }
                _ = &mut deadline => {
                    tracing::warn!(limit = ?self.drain_timeout, "Workers did not drain in time, aborting them");
                    return;
                }
                event = self.eventloop.poll() => {
                    if let Err(e) = event {
                        tracing::debug!(error = %e, "Broker error while draining");
                        tokio::time::sleep(DRAIN_ERROR_PAUSE).await;
                    }
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            tracing::warn!(error = %e, "Failed to queue DISCONNECT");
            return;
        }

        let flushed = within(DISCONNECT_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;

        if flushed.is_err() {
            tracing::warn!("DISCONNECT not flushed before deadline");
        }
        self.state = ConnectionState::Disconnected;
    }
}

fn suback_accepted(ack: &SubAck) -> bool {
    !ack.return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
}
