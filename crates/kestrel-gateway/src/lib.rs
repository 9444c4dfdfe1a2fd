// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway implementing ChannelAdapter.
//!
//! Clients post messages and later poll their chat's mailbox for replies.
//! By implementing the same ChannelAdapter trait as every other surface,
//! the gateway reuses the bus, the agent loop, and approvals unchanged.

pub mod auth;
pub mod handlers;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use kestrel_config::model::GatewayConfig;
use kestrel_core::{
    AdapterType, ChannelAdapter, HealthStatus, InboundMessage, KestrelError, OutboundMessage,
    PluginAdapter,
};
use tokio::sync::{Mutex, mpsc};

use crate::auth::AuthConfig;
use crate::handlers::MailboxEntry;
use crate::server::GatewayState;

/// Channel name used on the bus and in session keys.
pub const CHANNEL_NAME: &str = "http";

const INBOUND_CAPACITY: usize = 256;

#[derive(Clone, Default)]
pub struct GatewayChannelConfig {
    pub host: String,
    pub port: u16,
    pub bearer_token: Option<String>,
    pub allowed_senders: Vec<String>,
}

impl GatewayChannelConfig {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            host: config.bind_address.clone(),
            port: config.port,
            bearer_token: config.bearer_token.clone(),
            allowed_senders: config.allowed_senders.clone(),
        }
    }
}

impl std::fmt::Debug for GatewayChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayChannelConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("allowed_senders", &self.allowed_senders)
            .finish()
    }
}

/// The axum server runs as a background task. Handlers push inbound
/// messages to an mpsc queue read by `receive()`; `send()` files replies
/// into per-chat mailboxes drained by the polling endpoint.
pub struct GatewayChannel {
    config: GatewayChannelConfig,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    mailboxes: Arc<DashMap<String, Vec<MailboxEntry>>>,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl GatewayChannel {
    pub fn new(config: GatewayChannelConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            config,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            mailboxes: Arc::new(DashMap::new()),
            server_handle: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Address the server is listening on, once connected.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Number of replies waiting in a chat's mailbox.
    pub fn pending_replies(&self, chat_id: &str) -> usize {
        self.mailboxes.get(chat_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PluginAdapter for GatewayChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        match self.server_handle.lock().await.as_ref() {
            Some(handle) if !handle.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        if let Some(handle) = self.server_handle.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for GatewayChannel {
    async fn connect(&mut self) -> Result<(), KestrelError> {
        let listener = server::bind(&self.config.host, self.config.port).await?;
        let addr = listener.local_addr().map_err(|e| KestrelError::Channel {
            message: format!("gateway listener has no address: {e}"),
            source: Some(Box::new(e)),
        })?;

        let state = GatewayState {
            inbound_tx: self.inbound_tx.clone(),
            mailboxes: Arc::clone(&self.mailboxes),
            allowed_senders: Arc::new(self.config.allowed_senders.clone()),
            start_time: Instant::now(),
        };
        let auth = AuthConfig {
            bearer_token: self.config.bearer_token.clone(),
        };
        let app = server::build_router(state, auth);

        let handle = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, app).await {
                tracing::error!("gateway server error: {e}");
            }
        });
        *self.server_handle.lock().await = Some(handle);
        *self.local_addr.lock().await = Some(addr);

        tracing::info!(%addr, "gateway channel listening");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<(), KestrelError> {
        self.mailboxes
            .entry(msg.chat_id.clone())
            .or_default()
            .push(MailboxEntry {
                content: msg.content,
                media: msg.media,
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, KestrelError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| KestrelError::Channel {
            message: "gateway inbound channel closed".to_string(),
            source: None,
        })
    }
}
