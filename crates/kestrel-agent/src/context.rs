// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context assembly for model requests.
//!
//! The system prompt is rebuilt for every message from the identity block,
//! the configured prompt, workspace bootstrap files, long-term memory, and
//! skills. The current user turn carries a runtime-context suffix that is
//! sent to the model but never stored in the session.

use std::path::{Path, PathBuf};

use chrono::Local;
use kestrel_config::model::AgentConfig;
use kestrel_core::{ChatMessage, InboundMessage, KestrelError};
use tracing::{info, warn};

use crate::memory::MemoryStore;
use crate::skills::{self, SkillsLoader};

/// Workspace files inlined into the system prompt when present.
pub const BOOTSTRAP_FILES: [&str; 5] = ["AGENTS.md", "SOUL.md", "USER.md", "TOOLS.md", "IDENTITY.md"];

/// Marker opening the runtime suffix of the current user turn.
pub const RUNTIME_CONTEXT_TAG: &str = "[Runtime Context]";

/// Loads the system prompt following config priority: file > inline > default.
///
/// # Priority
/// 1. `config.system_prompt_file` -- reads from disk
/// 2. `config.system_prompt` -- inline string
/// 3. Default: "You are {name}, a helpful personal assistant."
pub async fn load_system_prompt(config: &AgentConfig) -> Result<String, KestrelError> {
    if let Some(ref file_path) = config.system_prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) => {
                let trimmed = content.trim().to_string();
                if !trimmed.is_empty() {
                    info!(path = file_path.as_str(), "loaded system prompt from file");
                    return Ok(trimmed);
                }
            }
            Err(e) => {
                warn!(
                    path = file_path.as_str(),
                    error = %e,
                    "failed to read system prompt file, falling back"
                );
            }
        }
    }

    if let Some(ref prompt) = config.system_prompt
        && !prompt.is_empty()
    {
        return Ok(prompt.clone());
    }

    Ok(format!("You are {}, a helpful personal assistant.", config.name))
}

pub struct ContextBuilder {
    agent_name: String,
    workspace: PathBuf,
    base_prompt: String,
    skills: SkillsLoader,
}

impl ContextBuilder {
    pub fn new(agent_name: impl Into<String>, workspace: &Path, base_prompt: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            workspace: workspace.to_path_buf(),
            base_prompt: base_prompt.into(),
            skills: SkillsLoader::new(workspace),
        }
    }

    /// Assembles the full system prompt.
    pub async fn build_system_prompt(&self, memory: &MemoryStore) -> String {
        let mut parts = vec![self.identity(), self.base_prompt.clone()];

        for name in BOOTSTRAP_FILES {
            let path = self.workspace.join(name);
            if let Ok(content) = tokio::fs::read_to_string(&path).await
                && !content.trim().is_empty()
            {
                parts.push(format!("## {name}\n\n{}", content.trim()));
            }
        }

        if let Some(memory) = memory.memory_context().await {
            parts.push(format!("# Memory\n\n{memory}"));
        }

        let skills = self.skills.load_all().await;
        parts.extend(skills::always_on_section(&skills));
        parts.extend(skills::summary_section(&skills));

        parts.join("\n\n---\n\n")
    }

    fn identity(&self) -> String {
        let workspace = self.workspace.display();
        format!(
            "# {name}\n\n\
             You are {name}, a personal assistant with access to tools.\n\n\
             ## Workspace\n\
             Your workspace is at: {workspace}\n\
             - Long-term memory: {workspace}/memory/MEMORY.md\n\
             - History log: {workspace}/memory/HISTORY.md\n\
             - Custom skills: {workspace}/skills/{{skill-name}}/SKILL.md\n\n\
             Reply directly with text for conversation. Only use tools when they help.",
            name = self.agent_name,
        )
    }

    /// System prompt, replayable history, then the current turn with its
    /// runtime suffix.
    pub fn build_messages(
        &self,
        system_prompt: String,
        history: Vec<ChatMessage>,
        current: &InboundMessage,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(format!(
            "{}\n\n{}",
            current.content,
            runtime_context(current)
        )));
        messages
    }
}

/// The runtime suffix: current time, channel, chat id, and attached media.
pub fn runtime_context(msg: &InboundMessage) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M (%A) %Z");
    let mut out = format!(
        "{RUNTIME_CONTEXT_TAG}\nCurrent Time: {now}\nChannel: {}\nChat ID: {}",
        msg.channel, msg.chat_id
    );
    if !msg.media.is_empty() {
        out.push_str("\nAttached media:");
        for item in &msg.media {
            out.push_str(&format!("\n- {item}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prompt_priority_inline_over_default() {
        let mut config = AgentConfig::default();
        assert!(load_system_prompt(&config).await.unwrap().contains("kestrel"));
        config.system_prompt = Some("Be terse.".into());
        assert_eq!(load_system_prompt(&config).await.unwrap(), "Be terse.");
    }

    #[tokio::test]
    async fn prompt_file_wins_and_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prompt.md");
        std::fs::write(&file, "  From file.  \n").unwrap();
        let mut config = AgentConfig {
            system_prompt: Some("inline".into()),
            system_prompt_file: Some(file.display().to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await.unwrap(), "From file.");

        config.system_prompt_file = Some(dir.path().join("missing.md").display().to_string());
        assert_eq!(load_system_prompt(&config).await.unwrap(), "inline");
    }

    #[tokio::test]
    async fn system_prompt_includes_bootstrap_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "Curious and kind.").unwrap();
        let memory = MemoryStore::new(dir.path());
        memory.write_long_term("Owns a cat.").await.unwrap();

        let builder = ContextBuilder::new("kestrel", dir.path(), "Base prompt.");
        let prompt = builder.build_system_prompt(&memory).await;
        assert!(prompt.starts_with("# kestrel"));
        assert!(prompt.contains("Base prompt."));
        assert!(prompt.contains("## SOUL.md\n\nCurious and kind."));
        assert!(prompt.contains("Owns a cat."));
        assert!(!prompt.contains("USER.md\n\n"));
    }

    #[test]
    fn current_turn_carries_runtime_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ContextBuilder::new("kestrel", dir.path(), "");
        let mut inbound = InboundMessage::new("http", "alice", "room-1", "what time is it?");
        inbound.media.push("/tmp/photo.jpg".into());

        let messages = builder.build_messages("sys".into(), vec![ChatMessage::user("earlier")], &inbound);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "sys");
        let last = &messages[2].content;
        assert!(last.starts_with("what time is it?\n\n[Runtime Context]"));
        assert!(last.contains("Channel: http"));
        assert!(last.contains("Chat ID: room-1"));
        assert!(last.contains("- /tmp/photo.jpg"));
    }
}
