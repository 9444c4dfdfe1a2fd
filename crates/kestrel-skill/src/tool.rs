// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{KestrelError, RiskTier, ToolDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Appended to every error result so the model tries something else.
pub const RETRY_HINT: &str = "[Analyze the error above and try a different approach.]";

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Where the current tool call originates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub channel: String,
    pub chat_id: String,
    pub session_key: String,
}

impl ToolContext {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let channel = channel.into();
        let chat_id = chat_id.into();
        let session_key = kestrel_core::session_key(&channel, &chat_id);
        Self {
            channel,
            chat_id,
            session_key,
        }
    }
}

/// A capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for lookup and in the model's tool catalog.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the argument object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// How dangerous a call is. Unclassified tools are treated as medium risk.
    fn risk_tier(&self) -> RiskTier {
        RiskTier::Medium
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError>;
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool under its `name()`, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declared risk tier of a tool, `None` if it is not registered.
    pub fn risk_tier(&self, name: &str) -> Option<RiskTier> {
        self.tools.get(name).map(|t| t.risk_tier())
    }

    /// Returns (name, description) pairs sorted by name.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    /// The tool catalog sent with every model call, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Runs a tool and always returns text for the model.
    ///
    /// Unknown tools, missing required parameters, invocation errors, and
    /// error outputs all come back starting with `Error` and ending with
    /// [`RETRY_HINT`].
    pub async fn execute(&self, name: &str, args: serde_json::Value, ctx: &ToolContext) -> String {
        let Some(tool) = self.get(name) else {
            let available: Vec<&str> = self.list().into_iter().map(|(n, _)| n).collect();
            warn!(tool = name, "model requested unknown tool");
            return annotate_error(format!(
                "Error: Tool '{name}' not found. Available: {}",
                available.join(", ")
            ));
        };

        if let Err(problem) = check_required(&tool.parameters_schema(), &args) {
            return annotate_error(format!(
                "Error: Invalid parameters for tool '{name}': {problem}"
            ));
        }

        debug!(tool = name, "executing tool");
        match tool.invoke(args, ctx).await {
            Ok(output) if output.is_error => {
                if output.content.starts_with("Error") {
                    annotate_error(output.content)
                } else {
                    annotate_error(format!("Error: {}", output.content))
                }
            }
            Ok(output) => output.content,
            Err(e) => {
                warn!(tool = name, error = %e, "tool invocation failed");
                annotate_error(format!("Error executing {name}: {e}"))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn annotate_error(message: String) -> String {
    format!("{message}\n\n{RETRY_HINT}")
}

/// Checks the argument object against the schema's `required` list.
fn check_required(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };
    let missing: Vec<&str> = schema["required"]
        .as_array()
        .map(|required| {
            required
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|key| object.get(*key).is_none_or(|v| v.is_null()))
                .collect()
        })
        .unwrap_or_default();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required parameter(s): {}", missing.join(", ")))
    }
}

/// Truncates a tool result to `max_chars` characters.
///
/// An error result keeps its trailing [`RETRY_HINT`]; only the body is cut.
pub fn clip_tool_result(text: &str, max_chars: usize) -> String {
    if let Some(body) = text.strip_suffix(RETRY_HINT)
        && text.chars().count() > max_chars
    {
        return annotate_error(clip_body(body.trim_end(), max_chars));
    }
    clip_body(text, max_chars)
}

fn clip_body(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let omitted = text[cut..].chars().count();
            format!("{}\n... (truncated, {omitted} more chars)", &text[..cut])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Message to echo" }
                },
                "required": ["message"]
            })
        }

        fn risk_tier(&self) -> RiskTier {
            RiskTier::Low
        }

        async fn invoke(
            &self,
            input: serde_json::Value,
            ctx: &ToolContext,
        ) -> Result<ToolOutput, KestrelError> {
            match input["message"].as_str() {
                Some("fail") => Err(KestrelError::Tool {
                    message: "echo refused".into(),
                    source: None,
                }),
                Some("soft") => Ok(ToolOutput::error("soft failure")),
                Some(message) => Ok(ToolOutput::success(format!("{}: {message}", ctx.chat_id))),
                None => Ok(ToolOutput::error("no message")),
            }
        }
    }

    struct PlainTool;

    #[async_trait]
    impl Tool for PlainTool {
        fn name(&self) -> &str {
            "plain"
        }

        fn description(&self) -> &str {
            "No declared risk"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, KestrelError> {
            Ok(ToolOutput::success("done"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(PlainTool));
        registry
    }

    #[test]
    fn definitions_and_list_are_sorted() {
        let registry = registry();
        let defs = registry.tool_definitions();
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "plain");
        assert_eq!(defs[0].parameters["type"], "object");
        assert_eq!(registry.list()[1], ("plain", "No declared risk"));
    }

    #[test]
    fn risk_tier_defaults_to_medium() {
        let registry = registry();
        assert_eq!(registry.risk_tier("echo"), Some(RiskTier::Low));
        assert_eq!(registry.risk_tier("plain"), Some(RiskTier::Medium));
        assert_eq!(registry.risk_tier("missing"), None);
    }

    #[tokio::test]
    async fn execute_returns_content_on_success() {
        let ctx = ToolContext::new("cli", "direct");
        let out = registry()
            .execute("echo", serde_json::json!({"message": "hi"}), &ctx)
            .await;
        assert_eq!(out, "direct: hi");
    }

    #[tokio::test]
    async fn execute_annotates_unknown_tool() {
        let ctx = ToolContext::default();
        let out = registry().execute("nope", serde_json::json!({}), &ctx).await;
        assert!(out.starts_with("Error: Tool 'nope' not found"));
        assert!(out.contains("echo, plain"));
        assert!(out.ends_with(RETRY_HINT));
    }

    #[tokio::test]
    async fn execute_reports_missing_required_parameters() {
        let ctx = ToolContext::default();
        let out = registry().execute("echo", serde_json::json!({}), &ctx).await;
        assert!(out.contains("missing required parameter(s): message"));
        assert!(out.ends_with(RETRY_HINT));
    }

    #[tokio::test]
    async fn execute_turns_invoke_errors_into_text() {
        let ctx = ToolContext::default();
        let out = registry()
            .execute("echo", serde_json::json!({"message": "fail"}), &ctx)
            .await;
        assert!(out.starts_with("Error executing echo"));
        assert!(out.contains("echo refused"));
        assert!(out.ends_with(RETRY_HINT));
    }

    #[tokio::test]
    async fn execute_prefixes_soft_errors() {
        let ctx = ToolContext::default();
        let out = registry()
            .execute("echo", serde_json::json!({"message": "soft"}), &ctx)
            .await;
        assert!(out.starts_with("Error: soft failure"));
    }

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip_tool_result("short", 10), "short");
        assert_eq!(clip_tool_result("exact", 5), "exact");
    }

    #[tokio::test]
    async fn clipped_error_keeps_retry_hint() {
        struct NoisyTool;

        #[async_trait]
        impl Tool for NoisyTool {
            fn name(&self) -> &str {
                "noisy"
            }

            fn description(&self) -> &str {
                "Fails with a huge message"
            }

            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }

            async fn invoke(
                &self,
                _input: serde_json::Value,
                _ctx: &ToolContext,
            ) -> Result<ToolOutput, KestrelError> {
                Ok(ToolOutput::error("x".repeat(20_000)))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NoisyTool));
        let raw = registry
            .execute("noisy", serde_json::json!({}), &ToolContext::default())
            .await;

        let clipped = clip_tool_result(&raw, 16_000);
        assert!(clipped.starts_with("Error: xxx"));
        assert!(clipped.contains("more chars)"));
        assert!(clipped.ends_with(RETRY_HINT));
    }

    #[test]
    fn short_error_is_left_alone() {
        let text = format!("Error: nope\n\n{RETRY_HINT}");
        assert_eq!(clip_tool_result(&text, 1_000), text);
    }

    #[test]
    fn clip_truncates_on_char_boundary() {
        let clipped = clip_tool_result("héllo wörld", 4);
        assert!(clipped.starts_with("héll\n"));
        assert!(clipped.contains("7 more chars"));
    }
}
