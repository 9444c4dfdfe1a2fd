// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval policy settings.

use std::collections::BTreeMap;
use std::time::Duration;

use kestrel_config::model::ApprovalConfig;

#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    pub enabled: bool,
    pub strict_mode: bool,
    /// How long a remote confirmation may stay unanswered.
    pub timeout: Duration,
    /// How long an approval of an identical call is remembered.
    pub memory_window: Duration,
    /// `true` forces a prompt, `false` waives it, regardless of tier.
    pub overrides: BTreeMap<String, bool>,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::from_config(&ApprovalConfig::default())
    }
}

impl ApprovalPolicy {
    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self {
            enabled: config.enabled,
            strict_mode: config.strict_mode,
            timeout: Duration::from_secs(config.timeout_secs),
            memory_window: Duration::from_secs(config.memory_window_secs),
            overrides: config.overrides.clone(),
        }
    }
}
