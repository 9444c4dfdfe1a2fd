// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kestrel agent` command implementation.
//!
//! Sends one message, or runs a readline REPL, against the agent loop in
//! this process. Tool approvals are asked for on the terminal.

use std::io::{BufRead, Write};
use std::sync::Arc;

use colored::Colorize;
use kestrel_approval::{ApprovalRequest, LocalPromptHandler};
use kestrel_config::model::KestrelConfig;
use kestrel_core::{InboundMessage, KestrelError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::runtime::Runtime;

const CHANNEL: &str = "cli";

pub async fn run_agent(
    config: KestrelConfig,
    message: Option<String>,
    session: String,
) -> Result<(), KestrelError> {
    let rt = Runtime::build(&config).await?;
    rt.approvals
        .register_handler(CHANNEL, Arc::new(LocalPromptHandler::new(prompt_on_terminal)));
    let chat_id = chat_id_for(&session).to_string();

    if let Some(message) = message {
        return send(&rt, &session, &chat_id, &message).await;
    }

    let mut rl = DefaultEditor::new()
        .map_err(|e| KestrelError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", format!("{} agent", config.agent.name).bold().green());
    println!("Type {} to exit.\n", "/quit".yellow());

    let prompt = format!("{}> ", "you".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                if let Err(e) = send(&rt, &session, &chat_id, trimmed).await {
                    eprintln!("{}: {e}", "error".red());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}

async fn send(rt: &Runtime, session: &str, chat_id: &str, content: &str) -> Result<(), KestrelError> {
    let msg = InboundMessage::new(CHANNEL, "user", chat_id, content).with_session_key(session);
    match rt.agent.process(msg).await? {
        Some(reply) => println!("\n{} {}\n", "kestrel:".cyan().bold(), reply.content),
        None => println!("{}", "(no reply)".dimmed()),
    }
    Ok(())
}

/// The chat id is whatever follows the first `:` of the session key.
fn chat_id_for(session: &str) -> &str {
    session
        .split_once(':')
        .map(|(_, chat)| chat)
        .filter(|chat| !chat.is_empty())
        .unwrap_or(session)
}

/// Blocking y/N prompt. Anything other than an explicit yes denies.
fn prompt_on_terminal(request: &ApprovalRequest) -> bool {
    eprintln!("\n{}", "Approval required".yellow().bold());
    eprintln!("{}", request.summary());
    eprint!("Allow? [y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_follows_the_colon() {
        assert_eq!(chat_id_for("cli:direct"), "direct");
        assert_eq!(chat_id_for("cli:a:b"), "a:b");
        assert_eq!(chat_id_for("scratch"), "scratch");
        assert_eq!(chat_id_for("cli:"), "cli:");
    }

    #[test]
    fn only_explicit_yes_approves() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("sure"));
        assert!(!is_yes("n"));
    }
}
