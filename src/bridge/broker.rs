//! Broker connection plumbing.
//!
//! # Responsibilities
//! - Parse the broker endpoint URL
//! - Open the single MQTT connection and wait for CONNACK
//! - Expose publishing through the [`Publisher`] seam so message handling
//!   can be exercised without a broker

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::bridge::error::{BridgeError, PublishError};
use crate::config::BrokerConfig;
use crate::resilience::timeouts::within;

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// Errors parsing the broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("'{0}' is not a URL")]
    Url(String),

    #[error("unsupported scheme '{0}' (expected mqtt, tcp, mqtts or ssl)")]
    Scheme(String),

    #[error("'{0}' has no host")]
    MissingHost(String),
}

/// Where the broker lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerEndpoint {
    /// Parse `mqtt://host[:port]`, `tcp://…`, `mqtts://…` or `ssl://…`.
    pub fn parse(endpoint: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(endpoint).map_err(|_| EndpointError::Url(endpoint.to_string()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => return Err(EndpointError::Scheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EndpointError::MissingHost(endpoint.to_string()))?
            .to_string();

        let port = url
            .port()
            .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        Ok(Self { host, port, tls })
    }
}

/// Map a validated QoS number onto the client's enum.
pub fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Client identifier from config, or a generated one.
pub fn client_id(config: &BrokerConfig) -> String {
    if config.client_id.is_empty() {
        format!("mqtt-http-bridge-{}", Uuid::new_v4().simple())
    } else {
        config.client_id.clone()
    }
}

/// Open the broker connection and wait for CONNACK.
///
/// Any failure here is fatal: the bridge must not run unconnected.
pub async fn connect(config: &BrokerConfig) -> Result<(AsyncClient, EventLoop), BridgeError> {
    let endpoint = BrokerEndpoint::parse(&config.endpoint)?;

    let mut options = MqttOptions::new(client_id(config), endpoint.host.clone(), endpoint.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
    if endpoint.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    let (client, mut eventloop) = AsyncClient::new(options, config.channel_capacity);

    let limit = Duration::from_secs(config.connect_timeout_secs);
    within(limit, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| BridgeError::ConnectTimeout(limit))??;

    tracing::info!(
        host = %endpoint.host,
        port = endpoint.port,
        tls = endpoint.tls,
        "Connected to broker"
    );
    Ok((client, eventloop))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BridgeError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(BridgeError::Connect(e)),
        }
    }
}

/// Sends reply payloads to the broker.
///
/// Implementations must be safe to call from many workers at once.
pub trait Publisher: Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// [`Publisher`] backed by the shared MQTT client handle.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, qos: QoS) -> Self {
        Self { client, qos }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(PublishError::from)
    }
}

/// A broker stand-in that answers CONNECT with CONNACK and swallows the rest.
#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// CONNACK, session not present, connection accepted.
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    /// Start the stand-in on an ephemeral port and return the port.
    pub async fn accepting_broker() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 64 * 1024];
                    if socket.read(&mut buf).await.unwrap_or(0) == 0 {
                        return;
                    }
                    if socket.write_all(&CONNACK).await.is_err() {
                        return;
                    }
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });
        port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::Outgoing;
    use tokio::net::TcpListener;

    use crate::codec::{self, BridgeReply};

    /// Publish a reply carrying `body_len` bytes and poll until it leaves or
    /// the event loop fails.
    async fn publish_reply(config: &BrokerConfig, body_len: usize) -> Result<(), rumqttc::ConnectionError> {
        let (client, mut eventloop) = connect(config).await.unwrap();
        let publisher = MqttPublisher::new(client, QoS::AtMostOnce);

        let reply = BridgeReply::new(200, Default::default(), &vec![b'x'; body_len]);
        let payload = codec::encode(&reply).unwrap();
        publisher.publish("replies/big", payload).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await
        .expect("event loop stalled")
    }

    #[test]
    fn test_parse_default_ports() {
        assert_eq!(
            BrokerEndpoint::parse("mqtt://test.mosquitto.org").unwrap(),
            BrokerEndpoint {
                host: "test.mosquitto.org".into(),
                port: 1883,
                tls: false
            }
        );
        assert_eq!(BrokerEndpoint::parse("mqtts://broker.example.com").unwrap().port, 8883);
        assert!(BrokerEndpoint::parse("ssl://broker.example.com").unwrap().tls);
    }

    #[test]
    fn test_parse_explicit_port() {
        let endpoint = BrokerEndpoint::parse("tcp://10.0.0.5:1884").unwrap();
        assert_eq!(endpoint.host, "10.0.0.5");
        assert_eq!(endpoint.port, 1884);
        assert!(!endpoint.tls);
    }

    #[test]
    fn test_parse_rejects_bad_endpoints() {
        assert!(matches!(
            BrokerEndpoint::parse("test.mosquitto.org"),
            Err(EndpointError::Url(_))
        ));
        assert_eq!(
            BrokerEndpoint::parse("http://broker:80"),
            Err(EndpointError::Scheme("http".into()))
        );
        assert!(matches!(
            BrokerEndpoint::parse("mqtt:///nohost"),
            Err(EndpointError::MissingHost(_))
        ));
    }

    #[test]
    fn test_qos_level() {
        assert_eq!(qos_level(0), QoS::AtMostOnce);
        assert_eq!(qos_level(1), QoS::AtLeastOnce);
        assert_eq!(qos_level(2), QoS::ExactlyOnce);
    }

    #[test]
    fn test_client_id_generated_when_empty() {
        let mut config = BrokerConfig::default();
        let generated = client_id(&config);
        assert!(generated.starts_with("mqtt-http-bridge-"));
        assert_ne!(generated, client_id(&config));

        config.client_id = "bridge-01".into();
        assert_eq!(client_id(&config), "bridge-01");
    }

    #[tokio::test]
    async fn test_large_reply_is_sent() {
        let port = testing::accepting_broker().await;
        let config = BrokerConfig {
            endpoint: format!("mqtt://127.0.0.1:{}", port),
            ..Default::default()
        };

        // Encodes to well over 10 KiB.
        publish_reply(&config, 64 * 1024).await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_over_packet_limit_fails_the_poll() {
        let port = testing::accepting_broker().await;
        let config = BrokerConfig {
            endpoint: format!("mqtt://127.0.0.1:{}", port),
            max_packet_size: 4 * 1024,
            ..Default::default()
        };

        let err = publish_reply(&config, 8 * 1024).await.unwrap_err();
        assert!(matches!(err, rumqttc::ConnectionError::MqttState(_)), "{err}");
    }

    #[tokio::test]
    async fn test_connect_refused_is_fatal() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = BrokerConfig {
            endpoint: format!("mqtt://127.0.0.1:{}", port),
            connect_timeout_secs: 5,
            ..Default::default()
        };

        let err = connect(&config).await.err().expect("expected connect to fail");
        assert!(matches!(err, BridgeError::Connect(_)), "{err}");
    }

    #[tokio::test]
    async fn test_silent_broker_times_out() {
        // Accepts TCP but never answers CONNECT.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = BrokerConfig {
            endpoint: format!("mqtt://127.0.0.1:{}", port),
            connect_timeout_secs: 1,
            ..Default::default()
        };

        let err = connect(&config).await.err().expect("expected connect to fail");
        assert!(matches!(err, BridgeError::ConnectTimeout(_)), "{err}");
    }
}
