// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kestrel serve` command implementation.
//!
//! Wires the bus, provider, tools, approvals, agent loop, scheduler, and
//! enabled channels, then runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use kestrel_agent::{ChannelManager, shutdown};
use kestrel_approval::BusApprovalHandler;
use kestrel_config::model::KestrelConfig;
use kestrel_core::KestrelError;
use kestrel_gateway::{GatewayChannel, GatewayChannelConfig};
use tracing::{info, warn};

use crate::runtime::{self, Runtime};

pub async fn run_serve(config: KestrelConfig) -> Result<(), KestrelError> {
    info!("starting kestrel serve");
    let rt = Runtime::build(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let mut channels = ChannelManager::new(Arc::clone(&rt.bus));
    if config.gateway.enabled {
        channels.add_channel(Box::new(GatewayChannel::new(
            GatewayChannelConfig::from_config(&config.gateway),
        )));
        rt.approvals.register_handler(
            kestrel_gateway::CHANNEL_NAME,
            BusApprovalHandler::new(
                Arc::clone(&rt.bus),
                Duration::from_secs(config.approval.timeout_secs),
            ),
        );
    }
    if channels.channel_names().is_empty() {
        warn!("no channels enabled, only scheduled jobs will reach the agent");
    }
    channels.start(cancel.clone()).await?;

    if config.cron.enabled {
        runtime::deliver_cron_to_bus(&rt.cron, Arc::clone(&rt.bus));
        rt.cron.start().await?;
    }

    rt.agent.run(cancel.clone()).await?;

    rt.cron.stop().await;
    channels.stop().await;
    info!("kestrel serve shutdown complete");
    Ok(())
}
