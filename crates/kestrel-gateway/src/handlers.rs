// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Posting a message only queues it; the agent's reply lands in the chat's
//! mailbox and is collected with a later GET.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use kestrel_core::InboundMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;

use crate::CHANNEL_NAME;
use crate::server::GatewayState;

const DEFAULT_SENDER: &str = "http-user";

/// Request body for POST /v1/messages.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub chat_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub content: String,
    /// Paths or URLs of attached media.
    #[serde(default)]
    pub media: Vec<String>,
}

/// Response body for POST /v1/messages.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
    pub chat_id: String,
    pub status: &'static str,
}

/// One delivered reply held until fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Response body for GET /v1/chats/{chat_id}/messages.
#[derive(Debug, Serialize)]
pub struct MailboxResponse {
    pub chat_id: String,
    pub messages: Vec<MailboxEntry>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// POST /v1/messages
///
/// Checks the sender allow-list, queues the message, and answers 202.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Json(body): Json<MessageRequest>,
) -> Response {
    if body.chat_id.trim().is_empty() || body.content.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "chat_id and content are required");
    }

    let sender = body
        .sender_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SENDER.to_string());
    if !state.allowed_senders.is_empty() && !state.allowed_senders.contains(&sender) {
        tracing::warn!(sender = %sender, chat_id = %body.chat_id, "sender not in allow-list");
        return error(StatusCode::FORBIDDEN, "sender not allowed");
    }

    let id = uuid::Uuid::new_v4().to_string();
    let mut inbound = InboundMessage::new(CHANNEL_NAME, sender, body.chat_id.clone(), body.content);
    inbound.media = body.media;
    inbound
        .metadata
        .insert("message_id".to_string(), serde_json::Value::String(id.clone()));

    match state.inbound_tx.try_send(inbound) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            return error(StatusCode::SERVICE_UNAVAILABLE, "inbound queue full");
        }
        Err(TrySendError::Closed(_)) => {
            return error(StatusCode::SERVICE_UNAVAILABLE, "agent not accepting messages");
        }
    }

    tracing::debug!(message_id = %id, chat_id = %body.chat_id, "message queued");
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            id,
            chat_id: body.chat_id,
            status: "queued",
        }),
    )
        .into_response()
}

/// GET /v1/chats/{chat_id}/messages
///
/// Returns and removes every reply waiting for the chat.
pub async fn get_chat_messages(
    State(state): State<GatewayState>,
    Path(chat_id): Path<String>,
) -> Json<MailboxResponse> {
    let messages = state
        .mailboxes
        .remove(&chat_id)
        .map(|(_, entries)| entries)
        .unwrap_or_default();
    Json(MailboxResponse { chat_id, messages })
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_request_defaults_optional_fields() {
        let req: MessageRequest =
            serde_json::from_str(r#"{"chat_id": "c1", "content": "Hello"}"#).unwrap();
        assert_eq!(req.chat_id, "c1");
        assert!(req.sender_id.is_none());
        assert!(req.media.is_empty());
    }

    #[test]
    fn message_request_requires_chat_id() {
        assert!(serde_json::from_str::<MessageRequest>(r#"{"content": "Hello"}"#).is_err());
    }

    #[test]
    fn mailbox_entry_omits_empty_media() {
        let entry = MailboxEntry {
            content: "hi".into(),
            media: Vec::new(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("media").is_none());
        assert_eq!(json["content"], "hi");
    }
}
