// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The approval gate consulted before every tool call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use kestrel_core::RiskTier;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::fingerprint::fingerprint;
use crate::handler::{ApprovalHandler, ApprovalRequest};
use crate::memory::ApprovalMemory;
use crate::policy::ApprovalPolicy;

/// Decides whether a tool call needs a human and, if so, asks one.
pub struct ApprovalManager {
    policy: ApprovalPolicy,
    memory: Mutex<ApprovalMemory>,
    handlers: RwLock<HashMap<String, Arc<dyn ApprovalHandler>>>,
}

impl ApprovalManager {
    pub fn new(policy: ApprovalPolicy) -> Self {
        let memory = ApprovalMemory::new(policy.memory_window);
        Self {
            policy,
            memory: Mutex::new(memory),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Registers the handler used for calls originating on `channel`.
    pub fn register_handler(&self, channel: impl Into<String>, handler: Arc<dyn ApprovalHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(channel.into(), handler);
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(channel)
    }

    /// Whether this call must be confirmed by a human.
    ///
    /// In order: a disabled gate never asks; an explicit per-tool override
    /// wins; strict mode asks for everything above low risk; high risk
    /// always asks; medium risk asks unless the identical call was approved
    /// for this chat within the memory window; low risk never asks.
    pub fn needs_approval(
        &self,
        tool_name: &str,
        arguments: &Value,
        tier: RiskTier,
        channel: &str,
        chat_id: &str,
    ) -> bool {
        if !self.policy.enabled {
            return false;
        }
        if let Some(&forced) = self.policy.overrides.get(tool_name) {
            return forced;
        }
        if self.policy.strict_mode && tier != RiskTier::Low {
            return true;
        }
        match tier {
            RiskTier::High => true,
            RiskTier::Medium => {
                let fp = fingerprint(arguments);
                let memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
                !memory.is_fresh(channel, chat_id, tool_name, &fp)
            }
            RiskTier::Low => false,
        }
    }

    /// Asks the channel's handler to confirm the call.
    ///
    /// Fails closed: no handler, a handler error, or a timeout all deny.
    /// An approval is remembered so identical medium-risk repeats skip the prompt.
    pub async fn request_approval(
        &self,
        tool_name: &str,
        arguments: &Value,
        channel: &str,
        chat_id: &str,
    ) -> bool {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .cloned();
        let Some(handler) = handler else {
            warn!(tool = tool_name, channel, "no approval handler for channel, denying");
            return false;
        };

        let request = ApprovalRequest::new(tool_name, arguments.clone(), channel, chat_id);
        debug!(approval_id = %request.id, tool = tool_name, channel, chat_id, "requesting approval");

        let approved = match handler.confirm(&request).await {
            Ok(approved) => approved,
            Err(e) => {
                warn!(tool = tool_name, channel, error = %e, "approval handler failed, denying");
                false
            }
        };

        if approved {
            let fp = fingerprint(arguments);
            self.memory
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record(channel, chat_id, tool_name, &fp);
        }
        info!(tool = tool_name, channel, chat_id, approved, "approval decided");
        approved
    }

    /// `needs_approval` followed by `request_approval` when required.
    pub async fn authorize(
        &self,
        tool_name: &str,
        arguments: &Value,
        tier: RiskTier,
        channel: &str,
        chat_id: &str,
    ) -> bool {
        if !self.needs_approval(tool_name, arguments, tier, channel, chat_id) {
            return true;
        }
        self.request_approval(tool_name, arguments, channel, chat_id)
            .await
    }
}
