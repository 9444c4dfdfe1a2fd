// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval handler with canned answers.

use std::sync::Mutex;

use async_trait::async_trait;
use kestrel_approval::{ApprovalHandler, ApprovalRequest};
use kestrel_core::KestrelError;

/// Answers every prompt with the same decision and records each request.
pub struct ScriptedApprovalHandler {
    answer: bool,
    prompts: Mutex<Vec<ApprovalRequest>>,
}

impl ScriptedApprovalHandler {
    pub fn approving() -> Self {
        Self::new(true)
    }

    pub fn denying() -> Self {
        Self::new(false)
    }

    fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn prompts(&self) -> Vec<ApprovalRequest> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ApprovalHandler for ScriptedApprovalHandler {
    async fn confirm(&self, request: &ApprovalRequest) -> Result<bool, KestrelError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(self.answer)
    }
}
