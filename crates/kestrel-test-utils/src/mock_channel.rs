// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound messages
//! and captured outbound messages. Clones share the same queues, so a test
//! can keep a handle after giving the channel away.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{
    AdapterType, ChannelAdapter, InboundMessage, KestrelError, OutboundMessage, PluginAdapter,
};
use tokio::sync::{Mutex, Notify};

#[derive(Clone)]
pub struct MockChannel {
    name: String,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    notify: Arc<Notify>,
}

impl MockChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Queues a message for the next `receive()`.
    pub async fn inject(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Builds and injects a text message from `sender` in `chat_id`.
    pub async fn inject_text(&self, sender: &str, chat_id: &str, content: &str) {
        self.inject(InboundMessage::new(self.name.clone(), sender, chat_id, content))
            .await;
    }

    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), KestrelError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<(), KestrelError> {
        self.sent.lock().await.push(msg);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, KestrelError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inject_then_receive() {
        let channel = MockChannel::new("mock");
        channel.inject_text("alice", "room", "hello").await;
        let msg = channel.receive().await.unwrap();
        assert_eq!(msg.channel, "mock");
        assert_eq!(msg.content, "hello");
    }

    #[tokio::test]
    async fn clones_share_sent_messages() {
        let channel = MockChannel::new("mock");
        let handle = channel.clone();
        channel
            .send(OutboundMessage::new("mock", "room", "hi"))
            .await
            .unwrap();
        assert_eq!(handle.sent_count().await, 1);
        assert_eq!(handle.sent_messages().await[0].content, "hi");
    }
}
