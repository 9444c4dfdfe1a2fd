// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! URL fetch tool. Bodies are truncated to 50KB.

use async_trait::async_trait;
use kestrel_core::KestrelError;

use crate::tool::{Tool, ToolContext, ToolOutput};

/// Maximum response body size in bytes (50KB).
const MAX_RESPONSE_SIZE: usize = 50 * 1024;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL with HTTP GET and return the status and body"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The http(s) URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        let url = input["url"].as_str().ok_or_else(|| KestrelError::Tool {
            message: "missing required 'url' parameter".to_string(),
            source: None,
        })?;

        let parsed = reqwest::Url::parse(url).map_err(|e| KestrelError::Tool {
            message: format!("invalid URL: {e}"),
            source: Some(Box::new(e)),
        })?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Ok(ToolOutput::error(format!(
                "URL scheme '{scheme}' not allowed. Only http and https are supported."
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| KestrelError::Tool {
                message: format!("request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| KestrelError::Tool {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        let body = if body.len() > MAX_RESPONSE_SIZE {
            let mut cut = MAX_RESPONSE_SIZE;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!(
                "{}...\n\n[Response truncated from {} to {cut} bytes]",
                &body[..cut],
                body.len()
            )
        } else {
            body
        };

        let content = format!("HTTP {}\n\n{body}", status.as_u16());
        if status.is_success() {
            Ok(ToolOutput::success(content))
        } else {
            Ok(ToolOutput::error(content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello page"))
            .mount(&server)
            .await;

        let out = WebFetchTool::new()
            .invoke(
                serde_json::json!({"url": format!("{}/page", server.uri())}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(!out.is_error);
        assert_eq!(out.content, "HTTP 200\n\nhello page");
    }

    #[tokio::test]
    async fn non_success_status_is_error_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let out = WebFetchTool::new()
            .invoke(
                serde_json::json!({"url": server.uri()}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.starts_with("HTTP 404"));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let out = WebFetchTool::new()
            .invoke(
                serde_json::json!({"url": "file:///etc/passwd"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("not allowed"));
    }
}
