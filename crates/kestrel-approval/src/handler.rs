// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval handler strategy and the local prompt implementation.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::KestrelError;
use serde_json::Value;

/// A tool call awaiting a human decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub channel: String,
    pub chat_id: String,
}

impl ApprovalRequest {
    pub fn new(
        tool_name: impl Into<String>,
        arguments: Value,
        channel: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// One-line summary of the call, arguments clipped for display.
    pub fn summary(&self) -> String {
        const MAX_ARGS: usize = 300;
        let args = self.arguments.to_string();
        let args = if args.chars().count() > MAX_ARGS {
            let clipped: String = args.chars().take(MAX_ARGS).collect();
            format!("{clipped}...")
        } else {
            args
        };
        format!("{}({args})", self.tool_name)
    }
}

/// Asks a human whether a tool call may proceed.
///
/// Returning `Err` is treated as a denial by the manager.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn confirm(&self, request: &ApprovalRequest) -> Result<bool, KestrelError>;
}

/// Synchronous prompt used by local channels (a terminal).
///
/// The prompt function blocks, so it runs on the blocking thread pool.
pub struct LocalPromptHandler {
    prompt: Arc<dyn Fn(&ApprovalRequest) -> bool + Send + Sync>,
}

impl LocalPromptHandler {
    pub fn new<F>(prompt: F) -> Self
    where
        F: Fn(&ApprovalRequest) -> bool + Send + Sync + 'static,
    {
        Self {
            prompt: Arc::new(prompt),
        }
    }
}

#[async_trait]
impl ApprovalHandler for LocalPromptHandler {
    async fn confirm(&self, request: &ApprovalRequest) -> Result<bool, KestrelError> {
        let prompt = self.prompt.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || prompt(&request))
            .await
            .map_err(|e| KestrelError::Approval(format!("local prompt failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_prompt_answer_is_returned() {
        let handler = LocalPromptHandler::new(|req| req.tool_name == "write_file");
        let yes = ApprovalRequest::new("write_file", serde_json::json!({}), "cli", "d");
        let no = ApprovalRequest::new("bash", serde_json::json!({}), "cli", "d");
        assert!(handler.confirm(&yes).await.unwrap());
        assert!(!handler.confirm(&no).await.unwrap());
    }

    #[tokio::test]
    async fn panicking_prompt_is_an_error() {
        let handler = LocalPromptHandler::new(|_| panic!("terminal gone"));
        let req = ApprovalRequest::new("bash", serde_json::json!({}), "cli", "d");
        assert!(handler.confirm(&req).await.is_err());
    }

    #[test]
    fn summary_clips_long_arguments() {
        let req = ApprovalRequest::new(
            "write_file",
            serde_json::json!({"content": "x".repeat(1000)}),
            "cli",
            "d",
        );
        let summary = req.summary();
        assert!(summary.starts_with("write_file({"));
        assert!(summary.ends_with("...)"));
        assert!(summary.len() < 400);
    }
}
