// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message bus decoupling chat surfaces from the agent.
//!
//! Two independent FIFO lanes: `inbound` (surfaces and the scheduler to the
//! agent) and `outbound` (agent to surfaces). Inbound filters can swallow a
//! message before it reaches any consumer, and passive observers receive a
//! copy of every delivered message over a broadcast channel.
//!
//! The bus is not persistent; anything queued is lost on restart.

mod lane;

use std::sync::{Arc, RwLock};

use kestrel_core::{InboundMessage, OutboundMessage};
use tokio::sync::broadcast;
use tracing::debug;

pub use lane::Lane;

/// Capacity of the observer broadcast channel. Slow observers lag and
/// miss events; they never hold up publishing.
const EVENT_CAPACITY: usize = 256;

/// Predicate that swallows an inbound message when it returns `true`.
pub type InboundFilter = Arc<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

/// Traffic copy delivered to passive observers.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Inbound(InboundMessage),
    Outbound(OutboundMessage),
}

/// Queue and parked-consumer counts for both lanes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStatus {
    pub inbound_queued: usize,
    pub inbound_waiting: usize,
    pub outbound_queued: usize,
    pub outbound_waiting: usize,
}

/// The message bus. Cheap to share behind an `Arc`.
pub struct MessageBus {
    inbound: Lane<InboundMessage>,
    outbound: Lane<OutboundMessage>,
    filters: RwLock<Vec<InboundFilter>>,
    events: broadcast::Sender<BusEvent>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inbound: Lane::new(),
            outbound: Lane::new(),
            filters: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Registers a filter run against every inbound message, in registration order.
    pub fn add_inbound_filter<F>(&self, filter: F)
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        let mut filters = self.filters.write().unwrap_or_else(|e| e.into_inner());
        filters.push(Arc::new(filter));
    }

    /// Publishes an inbound message unless a filter claims it.
    ///
    /// A panicking filter propagates and the message is not published.
    pub fn publish_inbound(&self, msg: InboundMessage) {
        // Snapshot so a filter may register further filters without deadlocking.
        let filters: Vec<InboundFilter> = self
            .filters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if filters.iter().any(|filter| filter(&msg)) {
            debug!(
                channel = %msg.channel,
                chat_id = %msg.chat_id,
                "inbound message claimed by filter"
            );
            return;
        }

        let _ = self.events.send(BusEvent::Inbound(msg.clone()));
        self.inbound.push(msg);
    }

    /// Waits for the next inbound message.
    pub async fn consume_inbound(&self) -> InboundMessage {
        self.inbound.pop().await
    }

    pub fn publish_outbound(&self, msg: OutboundMessage) {
        let _ = self.events.send(BusEvent::Outbound(msg.clone()));
        self.outbound.push(msg);
    }

    /// Waits for the next outbound message.
    pub async fn consume_outbound(&self) -> OutboundMessage {
        self.outbound.pop().await
    }

    /// Subscribes a passive observer to bus traffic.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> BusStatus {
        BusStatus {
            inbound_queued: self.inbound.len(),
            inbound_waiting: self.inbound.waiting(),
            outbound_queued: self.outbound.len(),
            outbound_waiting: self.outbound.waiting(),
        }
    }
}
