// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived memory of approved calls.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    channel: String,
    chat_id: String,
    tool: String,
    fingerprint: String,
}

/// Approval records keyed by `(channel, chat, tool, argument fingerprint)`.
///
/// Lives only in memory; a restart forgets every approval.
#[derive(Debug)]
pub struct ApprovalMemory {
    window: Duration,
    records: HashMap<RecordKey, Instant>,
}

impl ApprovalMemory {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: HashMap::new(),
        }
    }

    /// Remembers that this exact call was approved just now.
    pub fn record(&mut self, channel: &str, chat_id: &str, tool: &str, fingerprint: &str) {
        let now = Instant::now();
        let window = self.window;
        self.records
            .retain(|_, approved_at| now.duration_since(*approved_at) < window);
        self.records.insert(key(channel, chat_id, tool, fingerprint), now);
    }

    /// True if this exact call was approved within the window.
    pub fn is_fresh(&self, channel: &str, chat_id: &str, tool: &str, fingerprint: &str) -> bool {
        self.records
            .get(&key(channel, chat_id, tool, fingerprint))
            .is_some_and(|approved_at| approved_at.elapsed() < self.window)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn key(channel: &str, chat_id: &str, tool: &str, fingerprint: &str) -> RecordKey {
    RecordKey {
        channel: channel.to_string(),
        chat_id: chat_id.to_string(),
        tool: tool.to_string(),
        fingerprint: fingerprint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn record_expires_after_window() {
        let mut memory = ApprovalMemory::new(Duration::from_secs(60));
        memory.record("telegram", "1", "write_file", "abc");
        assert!(memory.is_fresh("telegram", "1", "write_file", "abc"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(memory.is_fresh("telegram", "1", "write_file", "abc"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!memory.is_fresh("telegram", "1", "write_file", "abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_scoped_to_chat_and_arguments() {
        let mut memory = ApprovalMemory::new(Duration::from_secs(60));
        memory.record("telegram", "1", "write_file", "abc");
        assert!(!memory.is_fresh("telegram", "2", "write_file", "abc"));
        assert!(!memory.is_fresh("slack", "1", "write_file", "abc"));
        assert!(!memory.is_fresh("telegram", "1", "write_file", "def"));
        assert!(!memory.is_fresh("telegram", "1", "bash", "abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_records_are_pruned_on_write() {
        let mut memory = ApprovalMemory::new(Duration::from_secs(10));
        memory.record("cli", "d", "a", "1");
        tokio::time::advance(Duration::from_secs(11)).await;
        memory.record("cli", "d", "b", "2");
        assert_eq!(memory.len(), 1);
    }
}
