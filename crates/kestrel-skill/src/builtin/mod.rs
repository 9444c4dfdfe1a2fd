// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools, always available without any plugin installation.

pub mod bash;
pub mod file;
pub mod web;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use bash::BashTool;
pub use file::{FsPolicy, ListDirTool, ReadFileTool, WriteFileTool};
pub use web::WebFetchTool;

use crate::ToolRegistry;

/// Settings shared by the built-in tools.
#[derive(Debug, Clone)]
pub struct BuiltinOptions {
    /// Working directory for shell commands and base for relative paths.
    pub workspace: PathBuf,
    /// Reject file paths outside `workspace`.
    pub restrict_to_workspace: bool,
    pub bash_timeout: Duration,
}

/// Registers all built-in tools into the given registry.
pub fn register_builtins(registry: &mut ToolRegistry, options: &BuiltinOptions) {
    let policy = FsPolicy::new(options.workspace.clone(), options.restrict_to_workspace);
    registry.register(Arc::new(BashTool::new(
        options.workspace.clone(),
        options.bash_timeout,
    )));
    registry.register(Arc::new(ReadFileTool::new(policy.clone())));
    registry.register(Arc::new(WriteFileTool::new(policy.clone())));
    registry.register(Arc::new(ListDirTool::new(policy)));
    registry.register(Arc::new(WebFetchTool::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::RiskTier;

    #[test]
    fn register_builtins_registers_five_tools_with_tiers() {
        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            &BuiltinOptions {
                workspace: std::env::temp_dir(),
                restrict_to_workspace: false,
                bash_timeout: Duration::from_secs(5),
            },
        );
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.risk_tier("bash"), Some(RiskTier::High));
        assert_eq!(registry.risk_tier("read_file"), Some(RiskTier::Low));
        assert_eq!(registry.risk_tier("list_dir"), Some(RiskTier::Low));
        assert_eq!(registry.risk_tier("write_file"), Some(RiskTier::Medium));
        assert_eq!(registry.risk_tier("web_fetch"), Some(RiskTier::Medium));
    }
}
