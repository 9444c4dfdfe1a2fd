// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation sessions and their JSON store.
//!
//! A session is checked out, mutated by the agent loop, and saved back.
//! Messages below `last_consolidated` have been archived to long-term
//! memory and are never replayed to the model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kestrel_core::{ChatMessage, KestrelError, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub messages: Vec<ChatMessage>,
    /// Index below which messages are archived. Always `<= messages.len()`.
    #[serde(default)]
    pub last_consolidated: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            messages: Vec::new(),
            last_consolidated: 0,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Messages not yet archived.
    pub fn unconsolidated(&self) -> &[ChatMessage] {
        &self.messages[self.last_consolidated.min(self.messages.len())..]
    }

    /// Moves the watermark forward. Never moves it backwards or past the end.
    pub fn advance_watermark(&mut self, to: usize) {
        let len = self.messages.len();
        self.last_consolidated = to.min(len).max(self.last_consolidated.min(len));
    }

    /// Replayable history for the model: unarchived, without tool-call
    /// transcript entries, at most `max_messages` long, and starting at a
    /// user turn.
    pub fn get_history(&self, max_messages: usize) -> Vec<ChatMessage> {
        let replayable: Vec<&ChatMessage> = self
            .unconsolidated()
            .iter()
            .filter(|m| !is_transcript_entry(m))
            .collect();
        let start = replayable.len().saturating_sub(max_messages);
        let window = &replayable[start..];
        let first_user = window
            .iter()
            .position(|m| m.role == Role::User)
            .unwrap_or(window.len());
        window[first_user..]
            .iter()
            .map(|m| ChatMessage {
                timestamp: None,
                ..(*m).clone()
            })
            .collect()
    }

    /// Drops every message and resets the watermark.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_consolidated = 0;
        self.updated_at = Utc::now();
    }
}

/// Persisted tool calls: assistant turns with no text and a call attached.
fn is_transcript_entry(message: &ChatMessage) -> bool {
    (message.role == Role::Assistant && message.content.is_empty() && !message.tool_calls.is_empty())
        || message.role == Role::Tool
}

/// One JSON document per session under a directory, cached in memory.
pub struct SessionStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the session for `key`, loading it on first touch.
    ///
    /// An unreadable document is logged and replaced by a fresh session.
    pub async fn get_or_create(&self, key: &str) -> Result<Session, KestrelError> {
        let mut cache = self.cache.lock().await;
        if let Some(session) = cache.get(key) {
            return Ok(session.clone());
        }

        let path = self.path_for(key);
        let session = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Session>(&bytes) {
                Ok(mut session) => {
                    session.last_consolidated = session.last_consolidated.min(session.messages.len());
                    debug!(session_key = key, messages = session.messages.len(), "session loaded");
                    session
                }
                Err(e) => {
                    warn!(session_key = key, error = %e, "corrupt session file, starting fresh");
                    Session::new(key)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Session::new(key),
            Err(e) => return Err(KestrelError::storage(e)),
        };
        cache.insert(key.to_string(), session.clone());
        Ok(session)
    }

    /// Writes the session to disk and refreshes the cache.
    pub async fn save(&self, session: &Session) -> Result<(), KestrelError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(session)?;
        let path = self.path_for(&session.key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        self.cache
            .lock()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_file_name(key)))
    }
}

/// Maps a session key onto a portable file name.
pub fn safe_file_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::ToolCall;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: format!("id-{name}"),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    #[test]
    fn history_skips_archived_and_transcript_entries() {
        let mut session = Session::new("cli:direct");
        session.add_message(ChatMessage::user("old"));
        session.add_message(ChatMessage::assistant("old answer"));
        session.add_message(ChatMessage::user("list files"));
        session.add_message(ChatMessage::assistant_with_tools("", vec![call("list_dir")]));
        session.add_message(ChatMessage::assistant("a.txt"));
        session.advance_watermark(2);

        let history = session.get_history(50);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["list files", "a.txt"]);
    }

    #[test]
    fn history_window_never_starts_with_assistant() {
        let mut session = Session::new("k");
        session.add_message(ChatMessage::user("one"));
        session.add_message(ChatMessage::assistant("two"));
        session.add_message(ChatMessage::user("three"));
        session.add_message(ChatMessage::assistant("four"));

        let history = session.get_history(3);
        assert_eq!(history[0].content, "three");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn watermark_is_clamped() {
        let mut session = Session::new("k");
        session.add_message(ChatMessage::user("one"));
        session.advance_watermark(10);
        assert_eq!(session.last_consolidated, 1);
        session.advance_watermark(0);
        assert_eq!(session.last_consolidated, 1);
        assert!(session.unconsolidated().is_empty());
        session.clear();
        assert_eq!(session.last_consolidated, 0);
    }

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(safe_file_name("telegram:12/34"), "telegram_12_34");
        assert_eq!(safe_file_name("cron:ab12"), "cron_ab12");
    }

    #[tokio::test]
    async fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        let mut session = store.get_or_create("http:room").await.unwrap();
        assert!(session.messages.is_empty());
        session.add_message(ChatMessage::user("hi"));
        session.advance_watermark(1);
        store.save(&session).await.unwrap();

        let fresh = SessionStore::new(dir.path().join("sessions"));
        let loaded = fresh.get_or_create("http:room").await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.last_consolidated, 1);
        assert!(dir.path().join("sessions/http_room.json").exists());
    }

    #[tokio::test]
    async fn corrupt_file_yields_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cli_direct.json"), "nope").unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.get_or_create("cli:direct").await.unwrap();
        assert!(session.messages.is_empty());
    }
}
