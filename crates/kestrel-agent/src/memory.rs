// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory: `MEMORY.md` holds curated facts, `HISTORY.md` is an
//! append-only log of archived conversation.
//!
//! Consolidation summarises the older part of a session through the model
//! and advances the session watermark.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use kestrel_core::{
    ChatMessage, KestrelError, ProviderAdapter, ProviderRequest, Role, ToolDefinition,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::session::Session;

const SAVE_MEMORY_TOOL: &str = "save_memory";

/// Files under `{workspace}/memory/`.
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            dir: workspace.join("memory"),
        }
    }

    pub fn memory_file(&self) -> PathBuf {
        self.dir.join("MEMORY.md")
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.join("HISTORY.md")
    }

    /// Current long-term facts, empty when the file does not exist.
    pub async fn read_long_term(&self) -> String {
        tokio::fs::read_to_string(self.memory_file())
            .await
            .unwrap_or_default()
    }

    pub async fn write_long_term(&self, content: &str) -> Result<(), KestrelError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.memory_file(), content).await?;
        Ok(())
    }

    /// Appends one entry to the history log, separated by a blank line.
    pub async fn append_history(&self, entry: &str) -> Result<(), KestrelError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_file())
            .await?;
        file.write_all(format!("{}\n\n", entry.trim_end()).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    /// The memory section of the system prompt, if there is anything to say.
    pub async fn memory_context(&self) -> Option<String> {
        let facts = self.read_long_term().await;
        let facts = facts.trim();
        (!facts.is_empty()).then(|| format!("## Long-term Memory\n{facts}"))
    }
}

/// Model settings used for the consolidation call.
#[derive(Debug, Clone)]
pub struct ConsolidationParams {
    pub model: String,
    pub max_tokens: u32,
    /// Newest messages left in the session after an incremental pass.
    pub keep_recent: usize,
}

/// Archives the older part of `session` into long-term memory.
///
/// With `archive_all`, every unconsolidated message is archived and the
/// watermark is left for the caller to reset (the session is about to be
/// cleared). Otherwise the newest `keep_recent` messages stay and the
/// watermark moves up to them. Returns `false` when there was nothing to do.
pub async fn consolidate(
    provider: &dyn ProviderAdapter,
    store: &MemoryStore,
    session: &mut Session,
    params: &ConsolidationParams,
    archive_all: bool,
) -> Result<bool, KestrelError> {
    let end = if archive_all {
        session.messages.len()
    } else {
        session.messages.len().saturating_sub(params.keep_recent)
    };
    let start = session.last_consolidated.min(end);
    if start >= end {
        debug!(session_key = %session.key, "nothing to consolidate");
        return Ok(false);
    }

    let transcript = render_transcript(&session.messages[start..end]);
    let current = store.read_long_term().await;
    let prompt = format!(
        "Process this conversation and call the {SAVE_MEMORY_TOOL} tool with your consolidation.\n\n\
         ## Current Long-term Memory\n{}\n\n## Conversation to Process\n{transcript}",
        if current.trim().is_empty() { "(empty)" } else { current.trim() }
    );

    let request = ProviderRequest {
        messages: vec![
            ChatMessage::system(
                "You are a memory consolidation agent. Call the save_memory tool with your \
                 consolidation of the conversation.",
            ),
            ChatMessage::user(prompt),
        ],
        tools: vec![save_memory_definition()],
        model: params.model.clone(),
        temperature: 0.0,
        max_tokens: params.max_tokens,
    };
    let response = provider.complete(request).await?;

    match response
        .tool_calls
        .iter()
        .find(|call| call.name == SAVE_MEMORY_TOOL)
    {
        Some(call) => {
            if let Some(entry) = call.arguments["history_entry"].as_str().filter(|e| !e.trim().is_empty()) {
                store.append_history(entry).await?;
            }
            if let Some(update) = call.arguments["memory_update"].as_str()
                && update != current
            {
                store.write_long_term(update).await?;
            }
        }
        None if !response.content.trim().is_empty() => {
            warn!(session_key = %session.key, "consolidation answered without save_memory, logging text");
            let stamp = Local::now().format("%Y-%m-%d %H:%M");
            store
                .append_history(&format!("[{stamp}] {}", response.content.trim()))
                .await?;
        }
        None => {
            return Err(KestrelError::Internal(
                "consolidation produced neither a save_memory call nor text".into(),
            ));
        }
    }

    if !archive_all {
        session.advance_watermark(end);
    }
    info!(
        session_key = %session.key,
        archived = end - start,
        last_consolidated = session.last_consolidated,
        "memory consolidated"
    );
    Ok(true)
}

fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| {
            if m.content.is_empty() {
                return None;
            }
            let stamp = m
                .timestamp
                .unwrap_or_else(Utc::now)
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M");
            let role = match m.role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
                Role::Tool => "TOOL",
            };
            Some(format!("[{stamp}] {role}: {}", m.content))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn save_memory_definition() -> ToolDefinition {
    ToolDefinition {
        name: SAVE_MEMORY_TOOL.to_string(),
        description: "Save the memory consolidation result to persistent storage.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "history_entry": {
                    "type": "string",
                    "description": "A paragraph (2-5 sentences) summarising key events and decisions. Start with [YYYY-MM-DD HH:MM]."
                },
                "memory_update": {
                    "type": "string",
                    "description": "Full updated long-term memory as markdown. Include existing facts plus new ones. Return unchanged if nothing new."
                }
            },
            "required": ["history_entry", "memory_update"]
        }),
    }
}
