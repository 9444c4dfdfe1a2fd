// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel manager connecting chat surfaces to the message bus.
//!
//! Each registered channel gets a background receive task that publishes
//! its inbound messages to the bus. A single dispatcher consumes the
//! outbound lane and routes every message to the channel named in its
//! `channel` field.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kestrel_bus::MessageBus;
use kestrel_core::{ChannelAdapter, HealthStatus, KestrelError, OutboundMessage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed receive before polling the channel again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct ChannelManager {
    bus: Arc<MessageBus>,
    /// Channels registered but not yet connected.
    pending: Vec<Box<dyn ChannelAdapter>>,
    channels: Arc<HashMap<String, Arc<dyn ChannelAdapter>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            pending: Vec::new(),
            channels: Arc::new(HashMap::new()),
            tasks: Vec::new(),
        }
    }

    /// Registers a channel under its adapter name. Must be called before `start`.
    pub fn add_channel(&mut self, channel: Box<dyn ChannelAdapter>) {
        self.pending.push(channel);
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pending
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.channels.keys().cloned())
            .collect();
        names.sort();
        names
    }

    /// Connects every channel, then spawns the receive tasks and the
    /// outbound dispatcher. All tasks stop when `cancel` fires.
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<(), KestrelError> {
        let mut connected: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
        for mut channel in std::mem::take(&mut self.pending) {
            channel.connect().await?;
            let name = channel.name().to_string();
            info!(channel = %name, "channel connected");
            connected.insert(name, Arc::from(channel));
        }
        self.channels = Arc::new(connected);

        for (name, channel) in self.channels.iter() {
            self.tasks.push(tokio::spawn(receive_loop(
                name.clone(),
                Arc::clone(channel),
                Arc::clone(&self.bus),
                cancel.clone(),
            )));
        }

        let bus = Arc::clone(&self.bus);
        let channels = Arc::clone(&self.channels);
        self.tasks.push(tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = bus.consume_outbound() => msg,
                    _ = cancel.cancelled() => break,
                };
                dispatch(&channels, msg).await;
            }
            debug!("outbound dispatcher stopped");
        }));

        info!(channels = self.channels.len(), "channel manager started");
        Ok(())
    }

    /// Aggregate health of the connected channels.
    pub async fn health(&self) -> HealthStatus {
        let mut problems = Vec::new();
        for (name, channel) in self.channels.iter() {
            match channel.health_check().await {
                Ok(HealthStatus::Healthy) => {}
                Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
                    problems.push(format!("{name}: {reason}"));
                }
                Err(e) => problems.push(format!("{name}: {e}")),
            }
        }
        if problems.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(problems.join("; "))
        }
    }

    /// Waits for the background tasks (the token must already be cancelled)
    /// and shuts the channels down.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        for (name, channel) in self.channels.iter() {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %name, error = %e, "channel shutdown error");
            }
        }
        info!("channel manager stopped");
    }
}

/// Routes one outbound message. Unknown channels and send failures are
/// logged and the message is dropped.
async fn dispatch(channels: &HashMap<String, Arc<dyn ChannelAdapter>>, msg: OutboundMessage) {
    let Some(channel) = channels.get(&msg.channel) else {
        warn!(channel = %msg.channel, chat_id = %msg.chat_id, "no such channel, dropping outbound message");
        return;
    };
    let (name, chat_id) = (msg.channel.clone(), msg.chat_id.clone());
    if let Err(e) = channel.send(msg).await {
        error!(channel = %name, chat_id = %chat_id, error = %e, "failed to deliver outbound message");
    }
}

async fn receive_loop(
    name: String,
    channel: Arc<dyn ChannelAdapter>,
    bus: Arc<MessageBus>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            received = channel.receive() => received,
            _ = cancel.cancelled() => break,
        };
        match received {
            Ok(mut msg) => {
                msg.channel = name.clone();
                bus.publish_inbound(msg);
            }
            Err(e) if e.to_string().contains("closed") => {
                info!(channel = %name, "channel closed, stopping receive task");
                break;
            }
            Err(e) => {
                warn!(channel = %name, error = %e, "channel receive error");
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
            }
        }
    }
    debug!(channel = %name, "receive task stopped");
}
