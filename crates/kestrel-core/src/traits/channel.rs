// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat surfaces.

use async_trait::async_trait;

use crate::error::KestrelError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, OutboundMessage};

/// Translates between a chat surface and the canonical bus messages.
///
/// Adapters authorize and deduplicate at their own layer; whatever
/// `receive` returns is published to the bus as-is.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the surface.
    async fn connect(&mut self) -> Result<(), KestrelError>;

    /// Delivers one message.
    async fn send(&self, msg: OutboundMessage) -> Result<(), KestrelError>;

    /// Waits for the next inbound message.
    async fn receive(&self) -> Result<InboundMessage, KestrelError>;
}
