use std::collections::HashMap;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rumqttc::{Event, EventLoop, Outgoing, Packet, QoS};
use uuid::Uuid;

use mqtt_http_bridge::bridge::broker;
use mqtt_http_bridge::codec::{self, BridgeReply, BridgeRequest};
use mqtt_http_bridge::config::schema::{BrokerConfig, DEFAULT_REQUEST_TOPIC};

/// How long to wait for the DISCONNECT packet to leave.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Send requests through a running MQTT/HTTP bridge", long_about = None)]
struct Cli {
    /// Broker URL
    #[arg(short, long, env = "MQ_ENDPOINT", default_value = "mqtt://test.mosquitto.org")]
    endpoint: String,

    /// Topic the bridge listens on
    #[arg(short, long, env = "MQ_TOPIC", default_value = DEFAULT_REQUEST_TOPIC)]
    topic: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one request and print the reply
    Request {
        /// Request path, may include a query string
        #[arg(default_value = "/")]
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Header as `name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Encoding tag of the body (e.g. URIComponent, base64, hex)
        #[arg(long)]
        encode_type: Option<String>,

        /// Seconds to wait for the reply
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Request {
            path,
            method,
            headers,
            body,
            encode_type,
            timeout,
        } => {
            let request = BridgeRequest {
                http_headers: Some(parse_headers(&headers)?),
                reply_topic: Some(format!("bridge-cli/reply/{}", Uuid::new_v4().simple())),
                http_path: Some(path),
                http_method: Some(method),
                http_body: body,
                http_body_encode_type: encode_type,
            };

            let config = BrokerConfig {
                endpoint: cli.endpoint,
                topic: cli.topic,
                ..Default::default()
            };
            let reply = send(&config, request, Duration::from_secs(timeout)).await?;
            print_reply(&reply)?;
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>, String> {
    raw.iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| format!("header '{}' is not `name: value`", header))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

async fn send(
    config: &BrokerConfig,
    request: BridgeRequest,
    timeout: Duration,
) -> Result<BridgeReply, Box<dyn std::error::Error>> {
    let reply_topic = request.reply_topic.clone().unwrap_or_default();
    let (client, mut eventloop) = broker::connect(config).await?;

    client.subscribe(&reply_topic, QoS::AtLeastOnce).await?;
    tokio::time::timeout(timeout, wait_for_suback(&mut eventloop))
        .await
        .map_err(|_| "timed out subscribing to reply topic")??;

    let payload = serde_json::to_vec(&request)?;
    client
        .publish(&config.topic, QoS::AtLeastOnce, false, payload)
        .await?;

    let raw = tokio::time::timeout(timeout, wait_for_reply(&mut eventloop, &reply_topic))
        .await
        .map_err(|_| format!("no reply on '{}' within {:?}", reply_topic, timeout))??;

    client.try_disconnect()?;
    if tokio::time::timeout(DISCONNECT_TIMEOUT, flush_disconnect(&mut eventloop))
        .await
        .is_err()
    {
        eprintln!("warning: DISCONNECT not sent before deadline");
    }

    Ok(serde_json::from_slice(&raw)?)
}

async fn wait_for_suback(eventloop: &mut EventLoop) -> Result<(), rumqttc::ConnectionError> {
    loop {
        if let Event::Incoming(Packet::SubAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn wait_for_reply(
    eventloop: &mut EventLoop,
    topic: &str,
) -> Result<Vec<u8>, rumqttc::ConnectionError> {
    loop {
        if let Event::Incoming(Packet::Publish(publish)) = eventloop.poll().await? {
            if publish.topic == topic {
                return Ok(publish.payload.to_vec());
            }
        }
    }
}

/// Poll until DISCONNECT has been written or the connection is gone.
async fn flush_disconnect(eventloop: &mut EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

fn print_reply(reply: &BridgeReply) -> Result<(), Box<dyn std::error::Error>> {
    println!("Status: {}", reply.status_code());
    let mut headers: Vec<_> = reply.headers().iter().collect();
    headers.sort();
    for (name, value) in headers {
        println!("{}: {}", name, value);
    }
    println!();

    let body = reply.body_bytes()?;
    match std::str::from_utf8(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", codec::BodyEncoding::Hex.encode(&body)?),
    }
    Ok(())
}
