mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use common::{start_hung_backend, start_local_app, RecordingPublisher};
use mqtt_http_bridge::bridge::{MessageHandler, Outcome, WorkerPool};
use mqtt_http_bridge::http::LocalClient;

fn handler(port: u16, timeout: Duration) -> (RecordingPublisher, MessageHandler<RecordingPublisher>) {
    let publisher = RecordingPublisher::default();
    let client = LocalClient::new(port, timeout, 1024 * 1024);
    (publisher.clone(), MessageHandler::new(publisher, client, false))
}

fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn test_get_ping_replies_with_base64_body() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    let message = payload(json!({
        "httpHeaders": {},
        "replyTopic": "r1",
        "httpPath": "/ping",
        "httpMethod": "GET"
    }));
    assert_eq!(handler.handle(&message).await, Outcome::Forwarded(200));

    let reply = publisher.reply("r1");
    assert_eq!(reply.status_code(), 200);
    assert_eq!(reply.body_encoding_tag(), "base64");
    assert_eq!(reply.encoded_body(), "cG9uZw==");
    assert_eq!(reply.headers().get("content-type").map(String::as_str), Some("text/plain; charset=utf-8"));
}

#[tokio::test]
async fn test_missing_headers_gets_exactly_one_400() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    assert_eq!(handler.handle(br#"{"replyTopic":"T"}"#).await, Outcome::Rejected);

    assert_eq!(publisher.count(), 1);
    let reply = publisher.reply("T");
    assert_eq!(reply.status_code(), 400);
    assert!(reply.headers().is_empty());
    assert_eq!(reply.body_bytes().unwrap(), b"invalid msg data");
}

#[tokio::test]
async fn test_no_reply_topic_publishes_nothing() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    let message = payload(json!({"httpHeaders": {}, "httpPath": "/ping", "httpMethod": "GET"}));
    assert_eq!(handler.handle(&message).await, Outcome::Dropped);
    assert_eq!(publisher.count(), 0);
}

#[tokio::test]
async fn test_uri_component_body_is_decoded_before_forwarding() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    let message = payload(json!({
        "httpHeaders": {"content-type": "text/plain", "x-custom": "kept", "Connection": "close"},
        "replyTopic": "r2",
        "httpPath": "echo?x=1",
        "httpBody": "hello%20world%21",
        "httpBodyEncodeType": "URIComponent"
    }));
    assert_eq!(handler.handle(&message).await, Outcome::Forwarded(200));

    let reply = publisher.reply("r2");
    assert_eq!(reply.body_bytes().unwrap(), b"hello world!");
    let headers = reply.headers();
    // Method defaults to POST, the path gains a leading slash.
    assert_eq!(headers.get("x-echo-method").map(String::as_str), Some("POST"));
    assert_eq!(headers.get("x-echo-query").map(String::as_str), Some("x=1"));
    assert_eq!(headers.get("x-custom").map(String::as_str), Some("kept"));
}

#[tokio::test]
async fn test_base64_body_reaches_local_server_as_bytes() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    let message = payload(json!({
        "httpHeaders": {},
        "replyTopic": "r3",
        "httpPath": "/echo",
        "httpMethod": "put",
        "httpBody": "AAEC/w==",
        "httpBodyEncodeType": "base64"
    }));
    assert_eq!(handler.handle(&message).await, Outcome::Forwarded(200));

    let reply = publisher.reply("r3");
    assert_eq!(reply.body_bytes().unwrap(), vec![0x00, 0x01, 0x02, 0xFF]);
    assert_eq!(reply.headers().get("x-echo-method").map(String::as_str), Some("PUT"));
}

#[tokio::test]
async fn test_non_200_status_is_relayed() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));

    let message = payload(json!({
        "httpHeaders": {},
        "replyTopic": "r4",
        "httpPath": "/status/404",
        "httpMethod": "GET"
    }));
    assert_eq!(handler.handle(&message).await, Outcome::Forwarded(404));

    let reply = publisher.reply("r4");
    assert_eq!(reply.status_code(), 404);
    assert!(reply.body_bytes().unwrap().is_empty());
}

#[tokio::test]
async fn test_hung_local_server_gets_504() {
    let port = start_hung_backend().await;
    let (publisher, handler) = handler(port, Duration::from_millis(300));

    let message = payload(json!({"httpHeaders": {}, "replyTopic": "r5", "httpMethod": "GET"}));
    assert_eq!(handler.handle(&message).await, Outcome::LocalFailure(504));

    let reply = publisher.reply("r5");
    assert_eq!(reply.status_code(), 504);
    assert_eq!(reply.body_bytes().unwrap(), b"local call timed out");
}

#[tokio::test]
async fn test_oversized_response_gets_502() {
    let port = start_local_app().await;
    let publisher = RecordingPublisher::default();
    let client = LocalClient::new(port, Duration::from_secs(5), 16);
    let handler = MessageHandler::new(publisher.clone(), client, false);

    let message = payload(json!({
        "httpHeaders": {},
        "replyTopic": "r6",
        "httpPath": "/big/1024",
        "httpMethod": "GET"
    }));
    assert_eq!(handler.handle(&message).await, Outcome::LocalFailure(502));
    assert_eq!(publisher.reply("r6").status_code(), 502);
}

#[tokio::test]
async fn test_fast_reply_is_not_blocked_by_slow_one() {
    let port = start_local_app().await;
    let (publisher, handler) = handler(port, Duration::from_secs(5));
    let pool = WorkerPool::spawn(Arc::new(handler), 2, 8);

    let slow = payload(json!({
        "httpHeaders": {},
        "replyTopic": "slow",
        "httpPath": "/slow/500",
        "httpMethod": "GET"
    }));
    let fast = payload(json!({
        "httpHeaders": {},
        "replyTopic": "fast",
        "httpPath": "/ping",
        "httpMethod": "GET"
    }));
    pool.try_submit(Bytes::from(slow)).unwrap();
    pool.try_submit(Bytes::from(fast)).unwrap();
    pool.join().await;

    assert_eq!(publisher.topics(), vec!["fast".to_string(), "slow".to_string()]);
    assert_eq!(publisher.reply("fast").body_bytes().unwrap(), b"pong");
    assert_eq!(publisher.reply("slow").body_bytes().unwrap(), b"slow");
}
