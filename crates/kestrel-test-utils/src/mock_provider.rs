// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use kestrel_core::{
    AdapterType, KestrelError, PluginAdapter, ProviderAdapter, ProviderRequest, ProviderResponse,
    TokenUsage, ToolCall,
};

/// A provider that replays queued responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a
/// default "mock response" text is returned. Every request is recorded.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, KestrelError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider pre-loaded with plain text answers.
    pub fn with_text(answers: &[&str]) -> Self {
        let provider = Self::new();
        for answer in answers {
            provider.push_text(*answer);
        }
        provider
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Ok(ProviderResponse {
            content: text.into(),
            finish_reason: Some("stop".into()),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
            }),
            ..ProviderResponse::default()
        }));
    }

    /// Queues a response requesting a single tool call.
    pub fn push_tool_call(&self, name: &str, arguments: serde_json::Value) {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        self.push(Ok(ProviderResponse {
            tool_calls: vec![ToolCall {
                id,
                name: name.to_string(),
                arguments,
            }],
            finish_reason: Some("tool_calls".into()),
            ..ProviderResponse::default()
        }));
    }

    pub fn push_error(&self, error: KestrelError) {
        self.push(Err(error));
    }

    pub fn push(&self, response: Result<ProviderResponse, KestrelError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, KestrelError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ProviderResponse {
                    content: "mock response".into(),
                    ..ProviderResponse::default()
                })
            })
    }
}
