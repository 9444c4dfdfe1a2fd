// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kestrel assistant runtime.
//!
//! This crate provides the error type, the canonical message types that flow
//! over the bus, the provider request/response model, and the adapter traits
//! implemented by chat surfaces and language-model backends.

pub mod error;
pub mod traits;
pub mod types;

pub use error::KestrelError;
pub use types::{
    AdapterType, ChatMessage, HealthStatus, InboundMessage, OutboundMessage, ProviderRequest,
    ProviderResponse, RiskTier, Role, TokenUsage, ToolCall, ToolDefinition, session_key,
};

pub use traits::{ChannelAdapter, PluginAdapter, ProviderAdapter};

/// Convenience alias used across the workspace.
pub type Result<T, E = KestrelError> = std::result::Result<T, E>;
