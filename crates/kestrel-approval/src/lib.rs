// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-in-the-loop approval gate for tool calls.
//!
//! [`ApprovalManager::needs_approval`] classifies a call by risk tier,
//! per-tool overrides, and a short-lived memory of recent approvals.
//! [`ApprovalManager::request_approval`] dispatches to the handler
//! registered for the originating channel: a synchronous prompt for local
//! channels, or a confirmation round-trip over the bus for remote ones.
//! Anything that goes wrong along the way counts as a denial.

pub mod fingerprint;
pub mod handler;
pub mod manager;
pub mod memory;
pub mod policy;
pub mod remote;

pub use fingerprint::fingerprint;
pub use handler::{ApprovalHandler, ApprovalRequest, LocalPromptHandler};
pub use manager::ApprovalManager;
pub use memory::ApprovalMemory;
pub use policy::ApprovalPolicy;
pub use remote::{BusApprovalHandler, classify_reply};
