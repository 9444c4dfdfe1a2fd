// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring shared by `serve`, `agent`, and `cron run`.

use std::sync::Arc;
use std::time::Duration;

use kestrel_agent::{AgentLoop, AgentSettings};
use kestrel_approval::{ApprovalManager, ApprovalPolicy};
use kestrel_bus::MessageBus;
use kestrel_config::model::KestrelConfig;
use kestrel_core::{InboundMessage, KestrelError, ProviderAdapter};
use kestrel_cron::{CronJob, CronService, CronTool};
use kestrel_openai::OpenAiProvider;
use kestrel_resilience::{RetryPolicy, RetryingProvider};
use kestrel_skill::ToolRegistry;
use kestrel_skill::builtin::{BuiltinOptions, register_builtins};
use tracing::{debug, info};

/// Target used when a job names no channel or chat.
pub const DEFAULT_CRON_CHANNEL: &str = "cli";
pub const DEFAULT_CRON_CHAT: &str = "direct";

pub struct Runtime {
    pub bus: Arc<MessageBus>,
    pub approvals: Arc<ApprovalManager>,
    pub cron: Arc<CronService>,
    pub agent: Arc<AgentLoop>,
}

impl Runtime {
    pub async fn build(config: &KestrelConfig) -> Result<Self, KestrelError> {
        tokio::fs::create_dir_all(&config.agent.workspace).await?;

        let bus = Arc::new(MessageBus::new());
        let provider = build_provider(config)?;
        let cron = Arc::new(CronService::new(config.cron.store_path.clone()));
        let tools = Arc::new(build_tools(config, config.cron.enabled.then(|| Arc::clone(&cron))));
        let approvals = Arc::new(ApprovalManager::new(ApprovalPolicy::from_config(
            &config.approval,
        )));
        let settings = AgentSettings::from_config(config).await?;
        let agent = Arc::new(AgentLoop::new(
            Arc::clone(&bus),
            provider,
            tools,
            Arc::clone(&approvals),
            settings,
        ));

        Ok(Self {
            bus,
            approvals,
            cron,
            agent,
        })
    }
}

/// OpenAI-compatible provider wrapped with retries for transient failures.
pub fn build_provider(config: &KestrelConfig) -> Result<Arc<dyn ProviderAdapter>, KestrelError> {
    let provider = OpenAiProvider::new(&config.provider)?;
    let policy = RetryPolicy::new(
        config.provider.max_retries,
        Duration::from_millis(config.provider.retry_base_delay_ms),
    );
    Ok(Arc::new(RetryingProvider::new(provider, policy)))
}

pub fn build_tools(config: &KestrelConfig, cron: Option<Arc<CronService>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtins(
        &mut registry,
        &BuiltinOptions {
            workspace: config.agent.workspace.clone(),
            restrict_to_workspace: config.tools.restrict_to_workspace,
            bash_timeout: Duration::from_secs(config.tools.bash_timeout_secs),
        },
    );
    if let Some(cron) = cron {
        registry.register(Arc::new(CronTool::new(cron)));
    }
    info!(tools = registry.len(), "tool registry initialized");
    registry
}

/// The synthetic message a firing job turns into.
pub fn cron_inbound(job: &CronJob) -> InboundMessage {
    let channel = job
        .payload
        .channel
        .clone()
        .unwrap_or_else(|| DEFAULT_CRON_CHANNEL.to_string());
    let chat_id = job
        .payload
        .to
        .clone()
        .unwrap_or_else(|| DEFAULT_CRON_CHAT.to_string());
    InboundMessage::new(channel, "cron", chat_id, job.payload.message.clone())
        .with_session_key(format!("cron:{}", job.id))
}

/// Firing jobs publish their message on the bus for the agent loop.
pub fn deliver_cron_to_bus(cron: &CronService, bus: Arc<MessageBus>) {
    cron.set_on_job(move |job| {
        let bus = Arc::clone(&bus);
        async move {
            debug!(job_id = %job.id, "cron job triggered: {}", job.payload.message);
            bus.publish_inbound(cron_inbound(&job));
            Ok::<_, KestrelError>(None)
        }
    });
}
