// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash commands handled before any model call, and reply cleanup.

use std::sync::LazyLock;

use regex::Regex;

pub const HELP_TEXT: &str = "Kestrel commands:\n\
    /new  - Start a new conversation (older messages are archived to memory)\n\
    /help - Show available commands";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    New,
    Help,
}

impl Command {
    /// Recognizes a command, ignoring case and surrounding whitespace.
    pub fn parse(content: &str) -> Option<Self> {
        match content.trim().to_ascii_lowercase().as_str() {
            "/new" => Some(Self::New),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }
}

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Removes `<think>…</think>` blocks some models emit before their answer.
pub fn strip_think(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_loosely() {
        assert_eq!(Command::parse("/new"), Some(Command::New));
        assert_eq!(Command::parse("  /HELP \n"), Some(Command::Help));
        assert_eq!(Command::parse("/news"), None);
        assert_eq!(Command::parse("please /new"), None);
    }

    #[test]
    fn help_mentions_every_command() {
        assert!(HELP_TEXT.contains("/new"));
        assert!(HELP_TEXT.contains("/help"));
    }

    #[test]
    fn strip_think_removes_blocks() {
        assert_eq!(strip_think("<think>plan\nsteps</think>\nHello"), "Hello");
        assert_eq!(strip_think("a <think>x</think>b<think>y</think>"), "a b");
        assert_eq!(strip_think("no markup"), "no markup");
    }
}
