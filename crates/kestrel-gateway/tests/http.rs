// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives a live gateway on an ephemeral port.

use std::time::Duration;

use kestrel_core::{ChannelAdapter, OutboundMessage, PluginAdapter};
use kestrel_gateway::{GatewayChannel, GatewayChannelConfig};
use serde_json::{Value, json};

async fn start(config: GatewayChannelConfig) -> (GatewayChannel, String) {
    let mut channel = GatewayChannel::new(GatewayChannelConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..config
    });
    channel.connect().await.unwrap();
    let addr = channel.local_addr().await.unwrap();
    (channel, format!("http://{addr}"))
}

#[tokio::test]
async fn post_queues_and_poll_drains_mailbox() {
    let (channel, base) = start(GatewayChannelConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/messages"))
        .json(&json!({"chat_id": "room-1", "sender_id": "alice", "content": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["chat_id"], "room-1");
    let id = body["id"].as_str().unwrap().to_string();

    let inbound = tokio::time::timeout(Duration::from_secs(1), channel.receive())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inbound.channel, "http");
    assert_eq!(inbound.sender_id, "alice");
    assert_eq!(inbound.chat_id, "room-1");
    assert_eq!(inbound.session_key(), "http:room-1");
    assert_eq!(inbound.metadata["message_id"], Value::String(id));

    channel
        .send(OutboundMessage::new("http", "room-1", "hi alice"))
        .await
        .unwrap();

    let url = format!("{base}/v1/chats/room-1/messages");
    let mailbox: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(mailbox["messages"].as_array().unwrap().len(), 1);
    assert_eq!(mailbox["messages"][0]["content"], "hi alice");

    let again: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert!(again["messages"].as_array().unwrap().is_empty());

    channel.shutdown().await.unwrap();
}

#[tokio::test]
async fn bearer_token_guards_api_but_not_health() {
    let (channel, base) = start(GatewayChannelConfig {
        bearer_token: Some("s3cret".into()),
        ..GatewayChannelConfig::default()
    })
    .await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);

    let payload = json!({"chat_id": "c", "content": "hi"});
    let denied = client
        .post(format!("{base}/v1/messages"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 401);

    let allowed = client
        .post(format!("{base}/v1/messages"))
        .bearer_auth("s3cret")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 202);

    channel.shutdown().await.unwrap();
}

#[tokio::test]
async fn unlisted_sender_is_forbidden_and_never_queued() {
    let (channel, base) = start(GatewayChannelConfig {
        allowed_senders: vec!["alice".into()],
        ..GatewayChannelConfig::default()
    })
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/messages"))
        .json(&json!({"chat_id": "c", "sender_id": "mallory", "content": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let empty = client
        .post(format!("{base}/v1/messages"))
        .json(&json!({"chat_id": "c", "sender_id": "alice", "content": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);

    let nothing = tokio::time::timeout(Duration::from_millis(100), channel.receive()).await;
    assert!(nothing.is_err());

    channel.shutdown().await.unwrap();
}
