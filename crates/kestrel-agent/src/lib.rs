// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop, sessions, and long-term memory for Kestrel.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Consumes inbound messages from the bus, one at a time
//! - Answers slash commands without calling the model
//! - Runs the model/tool round trip with approval gating
//! - Persists sessions and consolidates old turns into memory
//! - Publishes the reply to the outbound lane

pub mod channel_mux;
pub mod commands;
pub mod context;
pub mod memory;
pub mod session;
pub mod shutdown;
pub mod skills;

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use kestrel_approval::ApprovalManager;
use kestrel_bus::MessageBus;
use kestrel_config::model::KestrelConfig;
use kestrel_core::{
    ChatMessage, InboundMessage, KestrelError, OutboundMessage, ProviderAdapter, ProviderRequest,
};
use kestrel_skill::{RETRY_HINT, ToolContext, ToolRegistry, clip_tool_result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, HELP_TEXT, strip_think};
use crate::context::ContextBuilder;
use crate::memory::{ConsolidationParams, MemoryStore, consolidate};
use crate::session::{Session, SessionStore};

pub use crate::channel_mux::ChannelManager;

/// Loop behavior and model parameters, resolved from config once at startup.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub workspace: PathBuf,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_iterations: usize,
    pub memory_window: usize,
    pub consolidation_enabled: bool,
    pub max_tool_result_chars: usize,
}

impl AgentSettings {
    /// Resolves settings, reading the system prompt file if one is configured.
    pub async fn from_config(config: &KestrelConfig) -> Result<Self, KestrelError> {
        let system_prompt = context::load_system_prompt(&config.agent).await?;
        Ok(Self {
            name: config.agent.name.clone(),
            workspace: config.agent.workspace.clone(),
            system_prompt,
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_tool_iterations: config.agent.max_tool_iterations,
            memory_window: config.agent.memory_window,
            consolidation_enabled: config.agent.consolidation_enabled,
            max_tool_result_chars: config.agent.max_tool_result_chars,
        })
    }
}

/// The main agent loop that turns inbound messages into replies.
pub struct AgentLoop {
    bus: Arc<MessageBus>,
    provider: Arc<dyn ProviderAdapter>,
    tools: Arc<ToolRegistry>,
    approvals: Arc<ApprovalManager>,
    sessions: SessionStore,
    memory: MemoryStore,
    context: ContextBuilder,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(
        bus: Arc<MessageBus>,
        provider: Arc<dyn ProviderAdapter>,
        tools: Arc<ToolRegistry>,
        approvals: Arc<ApprovalManager>,
        settings: AgentSettings,
    ) -> Self {
        let workspace = settings.workspace.clone();
        info!(
            agent_name = settings.name.as_str(),
            workspace = %workspace.display(),
            tools = tools.len(),
            "agent loop initialized"
        );
        Self {
            bus,
            provider,
            tools,
            approvals,
            sessions: SessionStore::new(workspace.join("sessions")),
            memory: MemoryStore::new(&workspace),
            context: ContextBuilder::new(
                settings.name.clone(),
                &workspace,
                settings.system_prompt.clone(),
            ),
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Consumes the inbound lane until `cancel` fires.
    ///
    /// Messages are processed strictly one after another. A failing or
    /// panicking message is answered with an apology and the loop moves on.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), KestrelError> {
        info!("agent loop started");
        loop {
            let msg = tokio::select! {
                msg = self.bus.consume_inbound() => msg,
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            };

            let outcome = AssertUnwindSafe(self.process(msg.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(Some(reply))) => self.bus.publish_outbound(reply),
                Ok(Ok(None)) => debug!(channel = %msg.channel, chat_id = %msg.chat_id, "no reply"),
                Ok(Err(e)) => {
                    error!(channel = %msg.channel, chat_id = %msg.chat_id, error = %e, "failed to process message");
                    self.bus.publish_outbound(OutboundMessage::reply(
                        &msg,
                        format!("Sorry, I encountered an error: {e}"),
                    ));
                }
                Err(_) => {
                    error!(channel = %msg.channel, chat_id = %msg.chat_id, "message processing panicked");
                    self.bus.publish_outbound(OutboundMessage::reply(
                        &msg,
                        "Sorry, I encountered an error: internal failure",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Handles one inbound message to completion.
    ///
    /// Returns `None` when the model produced no text. Provider errors are
    /// returned after the session (with the user's turn) has been saved.
    pub async fn process(&self, msg: InboundMessage) -> Result<Option<OutboundMessage>, KestrelError> {
        let key = msg.session_key();
        let preview: String = msg.content.chars().take(80).collect();
        info!(channel = %msg.channel, sender = %msg.sender_id, session_key = %key, "processing message: {preview}");

        let mut session = self.sessions.get_or_create(&key).await?;

        match Command::parse(&msg.content) {
            Some(Command::New) => return self.start_new_session(&msg, session).await.map(Some),
            Some(Command::Help) => return Ok(Some(OutboundMessage::reply(&msg, HELP_TEXT))),
            None => {}
        }

        let history = session.get_history(self.settings.memory_window);
        session.add_message(ChatMessage::user(msg.content.clone()).stamped());

        let system_prompt = self.context.build_system_prompt(&self.memory).await;
        let messages = self.context.build_messages(system_prompt, history, &msg);

        let answer = match self.run_tool_loop(messages, &msg, &mut session).await {
            Ok(answer) => answer,
            Err(e) => {
                self.sessions.save(&session).await?;
                return Err(e);
            }
        };

        if !answer.is_empty() {
            session.add_message(ChatMessage::assistant(answer.clone()).stamped());
        }

        self.maybe_consolidate(&mut session).await;
        self.sessions.save(&session).await?;

        if answer.is_empty() {
            return Ok(None);
        }
        let preview: String = answer.chars().take(120).collect();
        info!(session_key = %key, "response: {preview}");
        Ok(Some(OutboundMessage::reply(&msg, answer)))
    }

    /// Calls the model until it answers without tool calls or the round
    /// budget runs out. Each executed call is persisted as a transcript entry.
    async fn run_tool_loop(
        &self,
        mut messages: Vec<ChatMessage>,
        msg: &InboundMessage,
        session: &mut Session,
    ) -> Result<String, KestrelError> {
        let tools = self.tools.tool_definitions();
        let mut ctx = ToolContext::new(msg.channel.clone(), msg.chat_id.clone());
        ctx.session_key = msg.session_key();
        let mut last_text = String::new();

        for round in 1..=self.settings.max_tool_iterations {
            let request = ProviderRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                model: self.settings.model.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };
            let response = self.provider.complete(request).await?;

            if !response.has_tool_calls() {
                return Ok(strip_think(&response.content));
            }
            last_text = strip_think(&response.content);
            debug!(round, calls = response.tool_calls.len(), "model requested tools");

            messages.push(ChatMessage::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let result = self.execute_tool(&call.name, &call.arguments, &ctx).await;
                let result = clip_tool_result(&result, self.settings.max_tool_result_chars);
                messages.push(ChatMessage::tool_result(call, result));
                session.add_message(
                    ChatMessage::assistant_with_tools("", vec![call.clone()]).stamped(),
                );
            }
        }

        warn!(
            max_rounds = self.settings.max_tool_iterations,
            "tool round budget exhausted without a final answer"
        );
        Ok(last_text)
    }

    /// Gates the call through approvals, then runs it.
    async fn execute_tool(&self, name: &str, args: &serde_json::Value, ctx: &ToolContext) -> String {
        if let Some(tier) = self.tools.risk_tier(name) {
            let approved = self
                .approvals
                .authorize(name, args, tier, &ctx.channel, &ctx.chat_id)
                .await;
            if !approved {
                info!(tool = name, chat_id = %ctx.chat_id, "tool call denied");
                return format!("Error: the user did not approve running '{name}'.\n\n{RETRY_HINT}");
            }
        }
        let preview: String = args.to_string().chars().take(200).collect();
        info!(tool = name, "tool call: {name}({preview})");
        self.tools.execute(name, args.clone(), ctx).await
    }

    /// `/new`: archive everything (when enabled), then clear the session.
    async fn start_new_session(
        &self,
        msg: &InboundMessage,
        mut session: Session,
    ) -> Result<OutboundMessage, KestrelError> {
        if self.settings.consolidation_enabled && !session.unconsolidated().is_empty() {
            let params = self.consolidation_params();
            if let Err(e) =
                consolidate(self.provider.as_ref(), &self.memory, &mut session, &params, true).await
            {
                warn!(session_key = %session.key, error = %e, "archival before /new failed");
                return Ok(OutboundMessage::reply(
                    msg,
                    "Memory archival failed, session not cleared. Please try again.",
                ));
            }
        }
        session.clear();
        self.sessions.save(&session).await?;
        info!(session_key = %session.key, "session cleared");
        Ok(OutboundMessage::reply(msg, "New session started."))
    }

    /// Incremental consolidation once the unarchived tail exceeds the window.
    async fn maybe_consolidate(&self, session: &mut Session) {
        if !self.settings.consolidation_enabled
            || session.unconsolidated().len() <= self.settings.memory_window
        {
            return;
        }
        let params = self.consolidation_params();
        if let Err(e) = consolidate(self.provider.as_ref(), &self.memory, session, &params, false).await {
            warn!(session_key = %session.key, error = %e, "memory consolidation failed");
        }
    }

    fn consolidation_params(&self) -> ConsolidationParams {
        ConsolidationParams {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            keep_recent: self.settings.memory_window / 2,
        }
    }
}
