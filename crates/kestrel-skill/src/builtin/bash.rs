// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell command execution.
//!
//! Runs `bash -c` in the workspace directory with a wall-clock limit. The
//! process is killed if the limit is reached.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::{KestrelError, RiskTier};

use crate::tool::{Tool, ToolContext, ToolOutput};

pub struct BashTool {
    working_dir: PathBuf,
    timeout: Duration,
}

impl BashTool {
    pub fn new(working_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            working_dir,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command in the workspace and return stdout/stderr"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::High
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        let command = input["command"].as_str().ok_or_else(|| KestrelError::Tool {
            message: "missing required 'command' parameter".to_string(),
            source: None,
        })?;

        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c").arg(command).kill_on_drop(true);
        if self.working_dir.is_dir() {
            cmd.current_dir(&self.working_dir);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| KestrelError::Tool {
                message: format!("failed to execute bash command: {e}"),
                source: Some(Box::new(e)),
            })?,
            Err(_) => {
                return Ok(ToolOutput::error(format!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            return Ok(ToolOutput::error(format!(
                "Exit code: {exit_code}\nstdout:\n{stdout}\nstderr:\n{stderr}"
            )));
        }

        let content = match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => "(no output)".to_string(),
            (_, true) => stdout.to_string(),
            _ => format!("{stdout}\nstderr:\n{stderr}"),
        };
        Ok(ToolOutput::success(content))
    }
}
