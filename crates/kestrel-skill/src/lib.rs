// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry, and built-in tools for the Kestrel assistant runtime.
//!
//! Every tool declares a [`RiskTier`](kestrel_core::RiskTier) that the
//! approval gate consults before the agent runs it. The [`ToolRegistry`]
//! never lets a tool failure escape: errors come back as text the model can
//! read and react to.
//!
//! Built-in tools:
//! - [`builtin::BashTool`] -- run a shell command (high risk)
//! - [`builtin::ReadFileTool`], [`builtin::ListDirTool`] -- inspect files (low risk)
//! - [`builtin::WriteFileTool`] -- write a file (medium risk)
//! - [`builtin::WebFetchTool`] -- fetch a URL (medium risk)

pub mod builtin;
pub mod tool;

pub use tool::{
    RETRY_HINT, Tool, ToolContext, ToolOutput, ToolRegistry, clip_tool_result,
};
