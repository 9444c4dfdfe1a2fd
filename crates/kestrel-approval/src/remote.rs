// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval round-trip over the message bus for remote chat surfaces.
//!
//! The handler sends a confirmation prompt to the chat and parks on a
//! oneshot channel. A bus inbound filter intercepts the user's yes/no reply
//! before it reaches the agent and resolves the oneshot. A timer denies the
//! request if nobody answers in time.
//!
//! At most one approval may be pending per chat. Every path that ends a
//! pending approval (reply, timeout) goes through [`settle`], which clears
//! the by-id entry, the by-chat entry, and the timer together.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use kestrel_bus::MessageBus;
use kestrel_core::{KestrelError, OutboundMessage};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::handler::{ApprovalHandler, ApprovalRequest};

const APPROVE_WORDS: &[&str] = &["yes", "y", "approve", "approved", "ok", "allow"];
const DENY_WORDS: &[&str] = &["no", "n", "deny", "denied", "reject", "cancel"];

/// Classifies a chat reply by its first word.
///
/// Returns `None` for anything that is not clearly a yes or a no, so normal
/// conversation keeps flowing to the agent.
pub fn classify_reply(text: &str) -> Option<bool> {
    let first = text.split_whitespace().next()?;
    let word = first
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if APPROVE_WORDS.contains(&word.as_str()) {
        Some(true)
    } else if DENY_WORDS.contains(&word.as_str()) {
        Some(false)
    } else {
        None
    }
}

type ChatKey = (String, String);

struct PendingApproval {
    request: ApprovalRequest,
    responder: oneshot::Sender<bool>,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct PendingState {
    by_id: HashMap<String, PendingApproval>,
    by_chat: HashMap<ChatKey, String>,
}

type SharedState = Arc<Mutex<PendingState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, PendingState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Resolves a pending approval and clears all of its bookkeeping.
///
/// Returns false if the id was not pending (already settled).
fn settle(state: &SharedState, id: &str, approved: bool) -> bool {
    let pending = {
        let mut guard = lock(state);
        let Some(pending) = guard.by_id.remove(id) else {
            return false;
        };
        let chat = (pending.request.channel.clone(), pending.request.chat_id.clone());
        if guard.by_chat.get(&chat).is_some_and(|pending_id| pending_id == id) {
            guard.by_chat.remove(&chat);
        }
        pending
    };

    if let Some(timer) = pending.timer {
        timer.abort();
    }
    // The waiting side may have been dropped; nothing to deliver then.
    let _ = pending.responder.send(approved);
    true
}

/// Approval handler for remote channels.
pub struct BusApprovalHandler {
    bus: Arc<MessageBus>,
    timeout: Duration,
    state: SharedState,
}

impl BusApprovalHandler {
    /// Creates the handler and installs its reply filter on the bus.
    pub fn new(bus: Arc<MessageBus>, timeout: Duration) -> Arc<Self> {
        let state: SharedState = Arc::new(Mutex::new(PendingState::default()));

        let filter_state = state.clone();
        bus.add_inbound_filter(move |msg| {
            let chat = (msg.channel.clone(), msg.chat_id.clone());
            let Some(id) = lock(&filter_state).by_chat.get(&chat).cloned() else {
                return false;
            };
            match classify_reply(&msg.content) {
                Some(approved) => {
                    info!(
                        approval_id = %id,
                        channel = %msg.channel,
                        chat_id = %msg.chat_id,
                        approved,
                        "approval reply received"
                    );
                    settle(&filter_state, &id, approved);
                    true
                }
                None => false,
            }
        });

        Arc::new(Self {
            bus,
            timeout,
            state,
        })
    }

    /// Number of approvals currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        lock(&self.state).by_id.len()
    }

    fn prompt_text(&self, request: &ApprovalRequest) -> String {
        format!(
            "Approval required before running a tool.\n\n{}\n\nReply \"yes\" to approve or \"no\" to deny (expires in {}s).",
            request.summary(),
            self.timeout.as_secs()
        )
    }
}

#[async_trait]
impl ApprovalHandler for BusApprovalHandler {
    async fn confirm(&self, request: &ApprovalRequest) -> Result<bool, KestrelError> {
        let chat = (request.channel.clone(), request.chat_id.clone());
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = lock(&self.state);
            if let Some(existing) = guard.by_chat.get(&chat) {
                return Err(KestrelError::Approval(format!(
                    "approval {existing} is already pending for {}:{}",
                    request.channel, request.chat_id
                )));
            }
            guard.by_chat.insert(chat, request.id.clone());
            guard.by_id.insert(
                request.id.clone(),
                PendingApproval {
                    request: request.clone(),
                    responder: tx,
                    timer: None,
                },
            );
        }

        let timer = {
            let state = self.state.clone();
            let bus = self.bus.clone();
            let id = request.id.clone();
            let (channel, chat_id) = (request.channel.clone(), request.chat_id.clone());
            let timeout = self.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if settle(&state, &id, false) {
                    info!(approval_id = %id, "approval timed out, denying");
                    bus.publish_outbound(OutboundMessage::new(
                        channel,
                        chat_id,
                        "Approval timed out; the action was not run.",
                    ));
                }
            })
        };
        match lock(&self.state).by_id.get_mut(&request.id) {
            Some(pending) => pending.timer = Some(timer.abort_handle()),
            // Already settled before the timer was attached.
            None => timer.abort(),
        }

        let mut prompt = OutboundMessage::new(
            request.channel.clone(),
            request.chat_id.clone(),
            self.prompt_text(request),
        );
        prompt
            .metadata
            .insert("approval_id".into(), request.id.clone().into());
        debug!(approval_id = %request.id, tool = %request.tool_name, "sending approval prompt");
        self.bus.publish_outbound(prompt);

        // A responder dropped without a decision counts as a denial.
        Ok(rx.await.unwrap_or(false))
    }
}
