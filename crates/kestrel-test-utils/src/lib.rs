// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kestrel integration tests.
//!
//! Provides scripted adapters for fast, deterministic, CI-runnable tests
//! without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted model provider that records every request
//! - [`MockChannel`] - Chat surface with message injection and capture
//! - [`RecordingTool`] - Tool that records its invocations
//! - [`ScriptedApprovalHandler`] - Approval handler with canned answers

pub mod mock_approval;
pub mod mock_channel;
pub mod mock_provider;
pub mod recording_tool;

pub use mock_approval::ScriptedApprovalHandler;
pub use mock_channel::MockChannel;
pub use mock_provider::MockProvider;
pub use recording_tool::RecordingTool;
