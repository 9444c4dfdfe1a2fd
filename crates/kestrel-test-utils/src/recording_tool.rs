// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A tool that records its invocations and answers with fixed text.

use std::sync::Mutex;

use async_trait::async_trait;
use kestrel_core::{KestrelError, RiskTier};
use kestrel_skill::{Tool, ToolContext, ToolOutput};

pub struct RecordingTool {
    name: String,
    tier: RiskTier,
    output: String,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>, tier: RiskTier, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier,
            output: output.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Arguments of every invocation, oldest first.
    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its arguments"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn risk_tier(&self) -> RiskTier {
        self.tier
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(input);
        Ok(ToolOutput::success(self.output.clone()))
    }
}
