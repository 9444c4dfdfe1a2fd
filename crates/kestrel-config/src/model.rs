// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Kestrel configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KestrelConfig {
    /// Agent identity and loop behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Language-model provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Human-in-the-loop approval settings.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Scheduled job settings.
    #[serde(default)]
    pub cron: CronConfig,

    /// HTTP gateway channel settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Built-in tool settings.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Workspace directory holding sessions, memory, skills, and bootstrap files.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Maximum model rounds per inbound message.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Unconsolidated message count that triggers consolidation.
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,

    /// Archive old session messages into long-term memory.
    #[serde(default = "default_true")]
    pub consolidation_enabled: bool,

    /// Tool results longer than this are clipped before reaching the model.
    #[serde(default = "default_max_tool_result_chars")]
    pub max_tool_result_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            workspace: default_workspace(),
            system_prompt: None,
            system_prompt_file: None,
            max_tool_iterations: default_max_tool_iterations(),
            memory_window: default_memory_window(),
            consolidation_enabled: true,
            max_tool_result_chars: default_max_tool_result_chars(),
        }
    }
}

fn default_agent_name() -> String {
    "kestrel".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workspace() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".kestrel").join("workspace"))
        .unwrap_or_else(|| PathBuf::from(".kestrel/workspace"))
}

fn default_max_tool_iterations() -> usize {
    20
}

fn default_memory_window() -> usize {
    50
}

fn default_max_tool_result_chars() -> usize {
    16_000
}

fn default_true() -> bool {
    true
}

/// OpenAI-compatible provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retries for transient failures (timeouts, 429, 5xx).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubled on each subsequent attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Approval gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalConfig {
    /// When false, no tool call is ever gated.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Gate every tool that is not low risk.
    #[serde(default)]
    pub strict_mode: bool,

    /// How long a remote confirmation may stay unanswered before it counts as denied.
    #[serde(default = "default_approval_timeout_secs")]
    pub timeout_secs: u64,

    /// How long an approval of a medium-risk call is remembered.
    #[serde(default = "default_memory_window_secs")]
    pub memory_window_secs: u64,

    /// Per-tool override: `true` always gates, `false` never gates.
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: false,
            timeout_secs: default_approval_timeout_secs(),
            memory_window_secs: default_memory_window_secs(),
            overrides: BTreeMap::new(),
        }
    }
}

fn default_approval_timeout_secs() -> u64 {
    60
}

fn default_memory_window_secs() -> u64 {
    300
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CronConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path of the JSON job store.
    #[serde(default = "default_cron_store_path")]
    pub store_path: PathBuf,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_path: default_cron_store_path(),
        }
    }
}

fn default_cron_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("kestrel").join("cron").join("jobs.json"))
        .unwrap_or_else(|| PathBuf::from("kestrel-cron.json"))
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on API routes. `None` leaves the API open.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Sender ids allowed to post messages. Empty allows everyone.
    #[serde(default)]
    pub allowed_senders: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            port: default_gateway_port(),
            bearer_token: None,
            allowed_senders: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Built-in tool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Wall-clock limit for one shell command.
    #[serde(default = "default_bash_timeout_secs")]
    pub bash_timeout_secs: u64,

    /// Reject file paths outside the agent workspace.
    #[serde(default)]
    pub restrict_to_workspace: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bash_timeout_secs: default_bash_timeout_secs(),
            restrict_to_workspace: false,
        }
    }
}

fn default_bash_timeout_secs() -> u64 {
    60
}
