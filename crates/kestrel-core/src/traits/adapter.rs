// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by channels and providers.

use async_trait::async_trait;

use crate::error::KestrelError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, lifecycle, and health check for every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the name of this adapter instance. For channels this is the
    /// channel identifier carried on every message.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        Ok(HealthStatus::Healthy)
    }

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), KestrelError> {
        Ok(())
    }
}
