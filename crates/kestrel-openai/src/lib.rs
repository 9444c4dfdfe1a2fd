// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat completions provider.
//!
//! Works with any endpoint that speaks the `/chat/completions` dialect
//! (OpenAI, OpenRouter, vLLM, Ollama's compatibility layer). One attempt per
//! call; retries belong to `kestrel-resilience`.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use kestrel_config::model::ProviderConfig;
use kestrel_core::{
    AdapterType, ChatMessage, HealthStatus, KestrelError, PluginAdapter, ProviderAdapter,
    ProviderRequest, ProviderResponse, Role, TokenUsage, ToolCall,
};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::types::{
    ApiErrorResponse, ApiFunctionCall, ApiFunctionDef, ApiMessage, ApiTool, ApiToolCall,
    ChatCompletionRequest, ChatCompletionResponse,
};

/// Provider adapter for OpenAI-compatible APIs.
///
/// API key resolution order: config, then `OPENAI_API_KEY`. A missing key is
/// allowed for local endpoints that do not authenticate.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, KestrelError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| KestrelError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KestrelError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let endpoint = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));
        info!(endpoint = %endpoint, model = %config.model, "OpenAI-compatible provider initialized");

        Ok(Self { client, endpoint })
    }
}

fn to_api_message(message: &ChatMessage) -> ApiMessage {
    let tool_calls = message
        .tool_calls
        .iter()
        .map(|call| ApiToolCall {
            id: call.id.clone(),
            call_type: "function".to_string(),
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        })
        .collect::<Vec<_>>();

    let content = if message.role == Role::Assistant
        && message.content.is_empty()
        && !tool_calls.is_empty()
    {
        None
    } else {
        Some(message.content.clone())
    };

    ApiMessage {
        role: message.role.to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
        name: if message.role == Role::Tool {
            message.name.clone()
        } else {
            None
        },
    }
}

fn to_request(request: &ProviderRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_api_message).collect(),
        tools: request
            .tools
            .iter()
            .map(|tool| ApiTool {
                tool_type: "function".to_string(),
                function: ApiFunctionDef {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn from_response(response: ChatCompletionResponse) -> Result<ProviderResponse, KestrelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| KestrelError::Provider {
            message: "response contained no choices".into(),
            status: None,
            source: None,
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                warn!(tool = %call.function.name, error = %e, "tool arguments were not valid JSON");
                serde_json::Value::Object(Default::default())
            });
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ProviderResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
        finish_reason: choice.finish_reason,
    })
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, KestrelError> {
        let body = to_request(&request);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| KestrelError::Provider {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");

        let text = response.text().await.map_err(|e| KestrelError::Provider {
            message: format!("failed to read response body: {e}"),
            status: Some(status.as_u16()),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!("API error ({status}): {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {text}"),
            };
            return Err(KestrelError::Provider {
                message,
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| KestrelError::Provider {
                message: format!("failed to parse API response: {e}"),
                status: Some(status.as_u16()),
                source: None,
            })?;
        from_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::ToolDefinition;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> OpenAiProvider {
        OpenAiProvider::new(&ProviderConfig {
            api_key: Some("sk-test".into()),
            api_base: base.to_string(),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hello")],
            tools: vec![ToolDefinition {
                name: "read_file".into(),
                description: "Read a file".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            model: "gpt-test".into(),
            temperature: 0.2,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn text_completion_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "tools": [{"type": "function", "function": {"name": "read_file"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Hi there!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(response.content, "Hi there!");
        assert!(!response.has_tool_calls());
        assert_eq!(response.usage.unwrap().prompt_tokens, 12);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn tool_calls_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "read_file");
        assert_eq!(response.tool_calls[0].arguments["path"], "a.txt");
    }

    #[tokio::test]
    async fn error_status_is_carried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "slow down"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri()).complete(request()).await.unwrap_err();
        assert!(err.is_transient());
        match err {
            KestrelError::Provider { status, message, .. } => {
                assert_eq!(status, Some(429));
                assert!(message.contains("slow down"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let err = provider(&server.uri()).complete(request()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn tool_call_turn_serializes_null_content_and_string_arguments() {
        let call = ToolCall {
            id: "call_9".into(),
            name: "bash".into(),
            arguments: serde_json::json!({"command": "ls"}),
        };
        let assistant = to_api_message(&ChatMessage::assistant_with_tools("", vec![call.clone()]));
        let json = serde_json::to_value(&assistant).unwrap();
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], "{\"command\":\"ls\"}");

        let result = to_api_message(&ChatMessage::tool_result(&call, "file.txt"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
    }
}
